use anyhow::{bail, Context, Result};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::connection::Database;
use crate::models::{Project, UNASSIGNED_PROJECT};

fn row_to_project(row: &Row) -> Result<Project, rusqlite::Error> {
    Ok(Project {
        id: row.get("id")?,
        name: row.get("name")?,
    })
}

impl Database {
    /// Creates a project, or returns the existing one with the same name.
    pub async fn add_project(&self, name: &str) -> Result<Project> {
        let name = name.trim().to_string();
        if name.is_empty() {
            bail!("project name must not be empty");
        }

        self.execute(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO projects (name) VALUES (?1)",
                params![name],
            )
            .context("failed to insert project")?;

            conn.query_row(
                "SELECT id, name FROM projects WHERE name = ?1",
                params![name],
                row_to_project,
            )
            .context("failed to load project")
        })
        .await
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare("SELECT id, name FROM projects ORDER BY name ASC")?;
            let projects = stmt
                .query_map([], row_to_project)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(projects)
        })
        .await
    }

    /// Returns whether a project was deleted. Events keep their stamped name.
    pub async fn delete_project(&self, project_id: i64) -> Result<bool> {
        self.execute(move |conn| {
            let deleted = conn
                .execute("DELETE FROM projects WHERE id = ?1", params![project_id])
                .context("failed to delete project")?;
            Ok(deleted > 0)
        })
        .await
    }

    /// Name for a project id; absent or unknown ids resolve to "Unassigned".
    pub async fn resolve_project_name(&self, project_id: Option<i64>) -> Result<String> {
        let Some(project_id) = project_id else {
            return Ok(UNASSIGNED_PROJECT.to_string());
        };

        self.execute(move |conn| {
            let name: Option<String> = conn
                .query_row(
                    "SELECT name FROM projects WHERE id = ?1",
                    params![project_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(name.unwrap_or_else(|| UNASSIGNED_PROJECT.to_string()))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("events.db")).unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn add_is_idempotent_and_list_is_sorted() {
        let (_dir, db) = open();
        let website = db.add_project("Website").await.unwrap();
        db.add_project("Accounting").await.unwrap();
        let again = db.add_project("  Website ").await.unwrap();
        assert_eq!(website, again);

        let names: Vec<_> = db
            .list_projects()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Accounting", "Website"]);
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let (_dir, db) = open();
        assert!(db.add_project("   ").await.is_err());
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() {
        let (_dir, db) = open();
        let project = db.add_project("Temp").await.unwrap();
        assert!(db.delete_project(project.id).await.unwrap());
        assert!(!db.delete_project(project.id).await.unwrap());
        assert!(db.list_projects().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn resolution_falls_back_to_unassigned() {
        let (_dir, db) = open();
        let project = db.add_project("Research").await.unwrap();
        assert_eq!(db.resolve_project_name(Some(project.id)).await.unwrap(), "Research");
        assert_eq!(db.resolve_project_name(Some(404)).await.unwrap(), UNASSIGNED_PROJECT);
        assert_eq!(db.resolve_project_name(None).await.unwrap(), UNASSIGNED_PROJECT);
    }
}
