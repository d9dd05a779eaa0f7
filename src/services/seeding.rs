use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, error, info};

use crate::auth::password::hash_password;
use crate::errors::CatalogError;
use crate::models::{NewProject, NewUser, UserRole};
use crate::repositories::{ProjectRepository, UserRepository};

pub const DEMO_PASSWORD: &str = "asdf";
pub const DEMO_ADMIN_EMAIL: &str = "test123@gmail.com";
pub const DEMO_CREATOR_EMAIL: &str = "asdf@gmail.com";

#[derive(Debug, Serialize, Deserialize)]
pub struct SeedingStats {
    pub users: i64,
    pub projects: i64,
    pub assignments: i64,
}

/// Demo accounts and projects for a fresh database.
pub struct SeedingService {
    pool: PgPool,
}

impl SeedingService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Safe to run repeatedly; rows that already exist are left alone.
    pub async fn seed_all(&self) -> Result<()> {
        info!("Starting database seeding...");

        self.seed_users().await?;
        let project_ids = self.seed_projects().await?;
        self.assign_admin(&project_ids).await?;

        info!("Database seeding completed successfully!");
        Ok(())
    }

    pub async fn clear_all(&self) -> Result<()> {
        info!("Clearing catalog data...");

        // Children first so no foreign key blocks a delete
        for table in ["data", "record", "userprojects", "project", "users"] {
            sqlx::query(&format!("DELETE FROM {}", table)).execute(&self.pool).await?;
        }

        info!("All catalog data cleared!");
        Ok(())
    }

    pub async fn get_stats(&self) -> Result<SeedingStats> {
        let users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let projects = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM project")
            .fetch_one(&self.pool)
            .await?;
        let assignments = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM userprojects")
            .fetch_one(&self.pool)
            .await?;

        Ok(SeedingStats { users, projects, assignments })
    }

    async fn seed_users(&self) -> Result<()> {
        info!("Seeding users...");
        let user_repo = UserRepository::new(self.pool.clone());

        let users = [
            (DEMO_ADMIN_EMAIL, UserRole::Admin),
            (DEMO_CREATOR_EMAIL, UserRole::Creator),
        ];

        for (email, role) in users {
            let user = NewUser {
                email: email.to_string(),
                firstname: "test".to_string(),
                lastname: "asdf".to_string(),
                password_hash: hash_password(DEMO_PASSWORD)?,
                role,
                active: true,
            };

            match user_repo.create_user(&user).await {
                Ok(created) => debug!("Created user: {} ({})", created.email, created.role),
                Err(CatalogError::Conflict(_)) => debug!("User {} already exists, skipping", email),
                Err(e) => {
                    error!("Failed to create user {}: {:?}", email, e);
                    return Err(e.into());
                }
            }
        }

        info!("Users seeding completed");
        Ok(())
    }

    async fn seed_projects(&self) -> Result<Vec<i32>> {
        info!("Seeding projects...");
        let project_repo = ProjectRepository::new(self.pool.clone());

        let projects = [("Test Project", "TS"), ("Another Project", "AS")];
        let mut ids = Vec::with_capacity(projects.len());

        for (name, code) in projects {
            let project = NewProject { name: name.to_string(), code: code.to_string(), finished: false };

            let id = match project_repo.create_project(&project).await {
                Ok(created) => {
                    debug!("Created project: {} ({})", created.name, created.code);
                    created.id
                }
                Err(CatalogError::Conflict(_)) => {
                    debug!("Project {} already exists, skipping", name);
                    project_repo
                        .find_by_name(name)
                        .await?
                        .map(|p| p.id)
                        .ok_or_else(|| anyhow::anyhow!("project {} vanished while seeding", name))?
                }
                Err(e) => {
                    error!("Failed to create project {}: {:?}", name, e);
                    return Err(e.into());
                }
            };
            ids.push(id);
        }

        info!("Projects seeding completed");
        Ok(ids)
    }

    async fn assign_admin(&self, project_ids: &[i32]) -> Result<()> {
        let user_repo = UserRepository::new(self.pool.clone());
        let admin = user_repo
            .find_by_email(DEMO_ADMIN_EMAIL)
            .await?
            .ok_or_else(|| anyhow::anyhow!("demo admin {} is missing", DEMO_ADMIN_EMAIL))?;

        for project_id in project_ids {
            user_repo.assign_project(admin.id, *project_id).await?;
        }

        debug!("Assigned {} demo projects to {}", project_ids.len(), admin.email);
        Ok(())
    }
}
