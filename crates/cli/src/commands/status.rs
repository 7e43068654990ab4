//! Health status CLI commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, StatusView};
use crate::output::{color_status, print_json, print_table, OutputFormat};

/// Row for routines table
#[derive(Tabled)]
struct RoutineRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Count")]
    count: usize,
    #[tabled(rename = "Workers")]
    workers: String,
}

/// Row for vitals table
#[derive(Tabled)]
struct VitalsRow {
    #[tabled(rename = "Signal")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Updated")]
    updated: String,
    #[tabled(rename = "Ago")]
    ago: String,
}

fn routine_rows(view: &StatusView) -> Vec<RoutineRow> {
    view.routines
        .iter()
        .map(|(category, ids)| RoutineRow {
            category: category.clone(),
            count: ids.split(',').filter(|id| !id.is_empty()).count(),
            workers: ids.clone(),
        })
        .collect()
}

fn vitals_rows(view: &StatusView) -> Vec<VitalsRow> {
    view.vitals
        .iter()
        .map(|(name, vitals)| VitalsRow {
            name: name.clone(),
            state: color_status(&vitals.status),
            updated: vitals.time_updated.clone(),
            ago: vitals.time_ago.clone(),
        })
        .collect()
}

/// Show the structured health view
pub async fn show_status(client: &ApiClient, path: &str, format: OutputFormat) -> Result<()> {
    let view: StatusView = client.get_json(path).await?;

    match format {
        OutputFormat::Json => print_json(&view)?,
        OutputFormat::Table => {
            println!(
                "{} {}  {}",
                "Health:".bold(),
                color_status(&view.status),
                view.message
            );
            println!();

            println!("{}", "Routines".bold());
            print_table(&routine_rows(&view), "No routine categories");
            println!();

            println!("{}", "Vitals".bold());
            print_table(&vitals_rows(&view), "No vitals reported");
        }
    }

    Ok(())
}

/// Print the agent's text rendering verbatim
pub async fn show_text(client: &ApiClient, path: &str) -> Result<()> {
    let text = client.get_text(path).await?;
    print!("{}", text);
    Ok(())
}

/// Fetch the current verdict; `Ok(true)` when healthy
pub async fn check(client: &ApiClient, path: &str) -> Result<bool> {
    let view: StatusView = client.get_json(path).await?;
    if view.is_healthy() {
        println!("{}", view.status);
    } else {
        println!("{}: {}", view.status, view.message);
    }
    Ok(view.is_healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn view(json: &str) -> StatusView {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_routine_rows_count_workers() {
        let view = view(
            r#"{"status":"healthy","message":"ok","routines":{"log":"","stats":"c1,c2"},"vitals":{}}"#,
        );
        let rows = routine_rows(&view);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].category, "log");
        assert_eq!(rows[0].count, 0);
        assert_eq!(rows[1].count, 2);
        assert_eq!(rows[1].workers, "c1,c2");
    }

    #[tokio::test]
    async fn test_check_reports_verdict() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/_health")
            .with_body(r#"{"status":"unhealthy","message":"RunningContainers:2","routines":{},"vitals":{}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/healthz")
            .with_body(r#"{"status":"healthy","message":"ok","routines":{},"vitals":{}}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        assert!(!check(&client, "/_health").await.unwrap());
        assert!(check(&client, "/healthz").await.unwrap());
    }
}
