//! Paginated workflow-run collection for one repository.

use dataset::runstore::WorkflowRun;
use tracing::{debug, info};

use crate::client::GhaClient;
use crate::error::GhaError;
use crate::models::WorkflowRunsResponse;

/// Hard cap on pages fetched per collection run.
const MAX_PAGES: u32 = 30;

/// Page through `GET /repos/{owner}/{repo}/actions/runs` until an empty page
/// or the page cap, extracting the store's record shape.
///
/// # Errors
///
/// Any non-2xx response or transport failure aborts the whole collection;
/// partial pages are never retried.
pub async fn collect_runs(
    client: &GhaClient,
    owner: &str,
    repo: &str,
    per_page: u32,
) -> Result<Vec<WorkflowRun>, GhaError> {
    let path = format!("/repos/{owner}/{repo}/actions/runs");
    let mut all_runs = Vec::new();

    for page in 1..=MAX_PAGES {
        let response: WorkflowRunsResponse = client
            .get_json(
                &path,
                &[
                    ("per_page", per_page.to_string()),
                    ("page", page.to_string()),
                ],
            )
            .await?;

        if response.workflow_runs.is_empty() {
            debug!(page, "Empty page, stopping");
            break;
        }

        debug!(page, runs = response.workflow_runs.len(), "Fetched page");
        all_runs.extend(response.workflow_runs.into_iter().map(|run| WorkflowRun {
            id: run.id,
            head_sha: run.head_sha,
            conclusion: run.conclusion,
            event: run.event,
            created_at: run.created_at,
        }));
    }

    info!(
        owner,
        repo,
        runs = all_runs.len(),
        "Workflow-run collection complete"
    );
    Ok(all_runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn run_json(id: u64, sha: &str, conclusion: Option<&str>) -> serde_json::Value {
        json!({
            "id": id,
            "name": "CI",
            "head_sha": sha,
            "status": "completed",
            "conclusion": conclusion,
            "event": "push",
            "created_at": "2024-05-01T12:00:00Z",
            "updated_at": "2024-05-01T12:04:00Z",
        })
    }

    #[tokio::test]
    async fn test_collects_until_empty_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/actions/runs"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "workflow_runs": [run_json(1, "aaa", Some("success")), run_json(2, "bbb", Some("failure"))]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/actions/runs"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "workflow_runs": [] })),
            )
            .mount(&server)
            .await;

        let client = GhaClient::with_base_url("t", &server.uri()).unwrap();
        let runs = collect_runs(&client, "acme", "widgets", 100).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, 1);
        assert_eq!(runs[0].head_sha.as_deref(), Some("aaa"));
        assert_eq!(runs[1].conclusion.as_deref(), Some("failure"));
    }

    #[tokio::test]
    async fn test_http_error_aborts_collection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/actions/runs"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = GhaClient::with_base_url("t", &server.uri()).unwrap();
        let err = collect_runs(&client, "acme", "widgets", 100)
            .await
            .unwrap_err();
        assert!(matches!(err, GhaError::Status { .. }));
    }

    #[tokio::test]
    async fn test_page_cap_bounds_collection() {
        let server = MockServer::start().await;
        // Every page is non-empty; only the cap stops the loop.
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/actions/runs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "workflow_runs": [run_json(1, "aaa", Some("success"))]
            })))
            .expect(30)
            .mount(&server)
            .await;

        let client = GhaClient::with_base_url("t", &server.uri()).unwrap();
        let runs = collect_runs(&client, "acme", "widgets", 1).await.unwrap();
        assert_eq!(runs.len(), 30);
    }
}
