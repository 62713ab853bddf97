//! Role-mapping repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use cbp_core::{
    Error, FracMapping, JobStatus, MappingScope, OrgType, Result, RoleMapping,
    RoleMappingRepository, RoleMappingRequest,
};

/// Sentinel shown on placeholder rows until the pipeline overwrites them.
pub const PLACEHOLDER_DESIGNATION: &str = "Generating...";

/// PostgreSQL implementation of [`RoleMappingRepository`].
pub struct PgRoleMappingRepository {
    pool: PgPool,
}

impl PgRoleMappingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Result<RoleMapping> {
        let status: String = row.get("status");
        let org_type: String = row.get("org_type");
        let responsibilities: JsonValue = row.get("role_responsibilities");
        let activities: JsonValue = row.get("activities");
        Ok(RoleMapping {
            id: row.get("id"),
            user_id: row.get("user_id"),
            org_type: OrgType::parse(&org_type),
            state_center_id: row.get("state_center_id"),
            department_id: row.get("department_id"),
            state_center_name: row.get("state_center_name"),
            department_name: row.get("department_name"),
            instruction: row.get("instruction"),
            status: JobStatus::parse(&status),
            error_message: row.get("error_message"),
            designation_name: row.get("designation_name"),
            wing_division_section: row.get("wing_division_section"),
            role_responsibilities: serde_json::from_value(responsibilities)?,
            activities: serde_json::from_value(activities)?,
            competencies: row.get("competencies"),
            sort_order: row.get("sort_order"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

const SELECT_COLUMNS: &str = "id, user_id, org_type, state_center_id, department_id, \
     state_center_name, department_name, instruction, status, error_message, \
     designation_name, wing_division_section, role_responsibilities, activities, \
     competencies, sort_order, created_at, updated_at";

#[async_trait]
impl RoleMappingRepository for PgRoleMappingRepository {
    async fn get(&self, id: Uuid) -> Result<Option<RoleMapping>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM role_mappings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_row).transpose()
    }

    async fn find_by_scope(&self, scope: &MappingScope) -> Result<Option<RoleMapping>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM role_mappings
             WHERE user_id = $1 AND state_center_id = $2
               AND department_id IS NOT DISTINCT FROM $3
             ORDER BY created_at ASC LIMIT 1"
        ))
        .bind(scope.user_id)
        .bind(&scope.state_center_id)
        .bind(scope.department_id.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_row).transpose()
    }

    async fn list_completed_by_scope(&self, scope: &MappingScope) -> Result<Vec<RoleMapping>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM role_mappings
             WHERE user_id = $1 AND state_center_id = $2
               AND department_id IS NOT DISTINCT FROM $3
               AND status = 'COMPLETED'
             ORDER BY sort_order ASC NULLS LAST, created_at ASC"
        ))
        .bind(scope.user_id)
        .bind(&scope.state_center_id)
        .bind(scope.department_id.as_deref())
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(Self::parse_row).collect()
    }

    async fn create_placeholder(&self, req: &RoleMappingRequest) -> Result<RoleMapping> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        debug!(placeholder_id = %id, state_center_id = %req.state_center_id, "Creating role-mapping placeholder");

        let row = sqlx::query(&format!(
            "INSERT INTO role_mappings (id, user_id, org_type, state_center_id, department_id,
                 state_center_name, department_name, instruction, status,
                 designation_name, wing_division_section, role_responsibilities,
                 activities, competencies, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'IN_PROGRESS',
                 $9, $9, '[]'::jsonb, '[]'::jsonb, '[]'::jsonb, $10, $10)
             RETURNING {SELECT_COLUMNS}"
        ))
        .bind(id)
        .bind(req.user_id)
        .bind(req.org_type.as_str())
        .bind(&req.state_center_id)
        .bind(req.department_id.as_deref())
        .bind(&req.state_center_name)
        .bind(req.department_name.as_deref())
        .bind(req.instruction.as_deref())
        .bind(PLACEHOLDER_DESIGNATION)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Self::parse_row(row)
    }

    async fn apply_generated(&self, id: Uuid, first: &FracMapping) -> Result<()> {
        sqlx::query(
            "UPDATE role_mappings
             SET status = 'COMPLETED', designation_name = $2, wing_division_section = $3,
                 role_responsibilities = $4, activities = $5, competencies = $6,
                 sort_order = $7, error_message = NULL, updated_at = $8
             WHERE id = $1",
        )
        .bind(id)
        .bind(&first.designation_name)
        .bind(first.wing_division_section.as_deref())
        .bind(serde_json::to_value(&first.role_responsibilities)?)
        .bind(serde_json::to_value(&first.activities)?)
        .bind(serde_json::to_value(&first.competencies)?)
        .bind(first.sort_order)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn insert_completed(
        &self,
        req: &RoleMappingRequest,
        rest: &[FracMapping],
    ) -> Result<u64> {
        let now = Utc::now();
        let mut inserted = 0u64;
        for frac in rest {
            sqlx::query(
                "INSERT INTO role_mappings (id, user_id, org_type, state_center_id, department_id,
                     state_center_name, department_name, instruction, status,
                     designation_name, wing_division_section, role_responsibilities,
                     activities, competencies, sort_order, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'COMPLETED',
                     $9, $10, $11, $12, $13, $14, $15, $15)",
            )
            .bind(Uuid::new_v4())
            .bind(req.user_id)
            .bind(req.org_type.as_str())
            .bind(&req.state_center_id)
            .bind(req.department_id.as_deref())
            .bind(&req.state_center_name)
            .bind(req.department_name.as_deref())
            .bind(req.instruction.as_deref())
            .bind(&frac.designation_name)
            .bind(frac.wing_division_section.as_deref())
            .bind(serde_json::to_value(&frac.role_responsibilities)?)
            .bind(serde_json::to_value(&frac.activities)?)
            .bind(serde_json::to_value(&frac.competencies)?)
            .bind(frac.sort_order)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<()> {
        sqlx::query(
            "UPDATE role_mappings
             SET status = 'FAILED', error_message = $2, updated_at = $3
             WHERE id = $1",
        )
        .bind(id)
        .bind(message)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn delete_by_scope(&self, scope: &MappingScope) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM role_mappings
             WHERE user_id = $1 AND state_center_id = $2
               AND department_id IS NOT DISTINCT FROM $3",
        )
        .bind(scope.user_id)
        .bind(&scope.state_center_id)
        .bind(scope.department_id.as_deref())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}
