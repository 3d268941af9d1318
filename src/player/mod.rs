//! Top-level orchestrator
//!
//! Fans scenarios out across the client pool with bounded concurrency,
//! delegates each to the runner, and aggregates one result per scenario.
//! Failures never escape [`Player::run`]; they surface only through the
//! severity predicates on [`Results`].

use std::sync::Arc;

use futures::future::join_all;
use tracing::info;

use crate::extension::ExtensionPipeline;
use crate::http::ClientPool;
use crate::results::{Results, ScenarioError, ScenarioResult};
use crate::runner::ScenarioRunner;
use crate::scenario::ScenarioSet;

/// Scenario orchestrator. Owns the pool and the pipeline for the duration
/// of a run; the scenario set stays read-only.
pub struct Player {
    pool: Arc<ClientPool>,
    pipeline: Arc<ExtensionPipeline>,
}

impl Player {
    pub fn new(pool: ClientPool, pipeline: ExtensionPipeline) -> Self {
        Self {
            pool: Arc::new(pool),
            pipeline: Arc::new(pipeline),
        }
    }

    /// Run every scenario in the set. Concurrency is capped by the pool
    /// size; results come back keyed and in set iteration order no matter
    /// which scenarios finish first.
    pub async fn run(&self, set: &ScenarioSet) -> Results {
        info!(
            "Playing {} scenarios (concurrency {})",
            set.len(),
            self.pool.size()
        );

        let mut handles = Vec::with_capacity(set.len());

        for scenario in set.iter() {
            let pool = self.pool.clone();
            let pipeline = self.pipeline.clone();
            let scenario = scenario.clone();

            handles.push(tokio::spawn(async move {
                let client = pool.acquire().await;
                let result = ScenarioRunner::new(&pipeline).run(&scenario, &client).await;
                pool.release(client);
                result
            }));
        }

        // join_all preserves spawn order, which keeps the aggregate
        // positionally stable regardless of completion order.
        let mut results = Results::new();
        for (scenario, joined) in set.iter().zip(join_all(handles).await) {
            let result = joined.unwrap_or_else(|e| {
                ScenarioResult::new(&scenario.key)
                    .with_error(ScenarioError::fatal(format!("scenario task failed: {e}")))
            });
            results.insert(result);
        }

        info!(
            "Run finished: {}/{} scenarios clean",
            results.len() - results.errored_count(),
            results.len()
        );

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::{Abort, Extension, HookResult};
    use crate::results::ErrorKind;
    use crate::scenario::{Scenario, Step};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal HTTP/1.1 server: route -> (status, headers, body), one
    /// request per connection.
    async fn mock_server(
        routes: HashMap<String, (u16, Vec<(String, String)>, String)>,
    ) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let routes = routes.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }

                    let head = String::from_utf8_lossy(&buf);
                    let path = head
                        .lines()
                        .next()
                        .and_then(|l| l.split_whitespace().nth(1))
                        .unwrap_or("/")
                        .to_string();
                    let cookies = head
                        .lines()
                        .find(|l| l.to_lowercase().starts_with("cookie:"))
                        .map(|l| l[7..].trim().to_string())
                        .unwrap_or_default();

                    let (status, headers, body) = routes
                        .get(&path)
                        .cloned()
                        .unwrap_or((404, Vec::new(), "not found".to_string()));
                    let body = body.replace("{cookies}", &cookies);

                    let mut response = format!("HTTP/1.1 {status} X\r\n");
                    for (k, v) in &headers {
                        response.push_str(&format!("{k}: {v}\r\n"));
                    }
                    response.push_str(&format!(
                        "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    ));

                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });

        addr
    }

    fn single_route(path: &str, status: u16, body: &str) -> HashMap<String, (u16, Vec<(String, String)>, String)> {
        let mut routes = HashMap::new();
        routes.insert(path.to_string(), (status, Vec::new(), body.to_string()));
        routes
    }

    fn player(concurrency: usize) -> Player {
        Player::new(
            ClientPool::new(concurrency, 5).unwrap(),
            ExtensionPipeline::new(),
        )
    }

    fn resolved(mut scenario: Scenario, endpoint: String) -> Scenario {
        scenario.endpoint = Some(endpoint);
        scenario.resolved = true;
        scenario
    }

    #[tokio::test]
    async fn passing_scenario_has_clean_result() {
        let addr = mock_server(single_route("/", 200, "welcome")).await;
        let endpoint = format!("http://{addr}");

        let mut set = ScenarioSet::new();
        set.push(resolved(
            Scenario::new("home").step(Step::get("visit", "/").expect("status == 200")),
            endpoint,
        ))
        .unwrap();

        let results = player(1).run(&set).await;

        assert_eq!(results.len(), 1);
        assert!(!results.is_fatal_error());
        assert!(!results.is_expectation_error());
        assert!(!results.is_errored());
        assert_eq!(results.exit_code(), 0);
    }

    #[tokio::test]
    async fn failing_assertion_is_expectation_error() {
        let addr = mock_server(single_route("/", 500, "boom")).await;
        let endpoint = format!("http://{addr}");

        let mut set = ScenarioSet::new();
        set.push(resolved(
            Scenario::new("home").step(Step::get("visit", "/").expect("status == 200")),
            endpoint,
        ))
        .unwrap();

        let results = player(1).run(&set).await;

        let result = results.get("home").unwrap();
        assert_eq!(result.severity(), Some(ErrorKind::Expectation));
        assert_eq!(results.exit_code(), 64);
    }

    #[tokio::test]
    async fn connection_failure_is_fatal_and_isolated() {
        let addr = mock_server(single_route("/", 200, "ok")).await;
        let live = format!("http://{addr}");
        // An unroutable port: connection refused.
        let dead = "http://127.0.0.1:1".to_string();

        let mut set = ScenarioSet::new();
        set.push(resolved(
            Scenario::new("broken").step(Step::get("visit", "/")),
            dead,
        ))
        .unwrap();
        set.push(resolved(
            Scenario::new("healthy").step(Step::get("visit", "/").expect("status == 200")),
            live,
        ))
        .unwrap();

        let results = player(1).run(&set).await;

        // One scenario's fatal error never aborts its sibling.
        assert_eq!(results.len(), 2);
        assert_eq!(
            results.get("broken").unwrap().severity(),
            Some(ErrorKind::Fatal)
        );
        assert!(results.get("healthy").unwrap().error.is_none());
        assert!(results.is_fatal_error());
        assert_eq!(results.exit_code(), 65);
    }

    #[tokio::test]
    async fn results_keep_input_order_under_concurrency() {
        let addr = mock_server(single_route("/", 200, "ok")).await;
        let endpoint = format!("http://{addr}");

        let mut set = ScenarioSet::new();
        for key in ["e", "d", "c", "b", "a"] {
            set.push(resolved(
                Scenario::new(key).step(Step::get("visit", "/")),
                endpoint.clone(),
            ))
            .unwrap();
        }

        let results = player(3).run(&set).await;

        assert_eq!(results.len(), set.len());
        let keys: Vec<_> = results.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["e", "d", "c", "b", "a"]);
    }

    /// Tracks how many scenarios are in flight at once.
    struct ConcurrencyProbe {
        current: AtomicUsize,
        max: AtomicUsize,
    }

    impl ConcurrencyProbe {
        fn new() -> Self {
            Self {
                current: AtomicUsize::new(0),
                max: AtomicUsize::new(0),
            }
        }
    }

    impl Extension for ConcurrencyProbe {
        fn name(&self) -> &str {
            "concurrency-probe"
        }

        fn on_scenario_start(&self, _scenario: &Scenario) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.max.fetch_max(now, Ordering::SeqCst);
        }

        fn on_scenario_end(&self, _scenario: &Scenario, _result: &ScenarioResult) {
            self.current.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_pool_size() {
        let addr = mock_server(single_route("/", 200, "ok")).await;
        let endpoint = format!("http://{addr}");

        let probe = Arc::new(ConcurrencyProbe::new());
        let mut pipeline = ExtensionPipeline::new();
        pipeline.register(0, probe.clone());

        let player = Player::new(ClientPool::new(2, 5).unwrap(), pipeline);

        let mut set = ScenarioSet::new();
        for i in 0..6 {
            set.push(resolved(
                Scenario::new(format!("s{i}")).step(Step::get("visit", "/")),
                endpoint.clone(),
            ))
            .unwrap();
        }

        let results = player.run(&set).await;

        assert_eq!(results.len(), 6);
        assert!(probe.max.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn cookies_persist_across_steps_within_a_scenario() {
        let mut routes = HashMap::new();
        routes.insert(
            "/set".to_string(),
            (
                200,
                vec![("Set-Cookie".to_string(), "sid=abc123; Path=/".to_string())],
                "ok".to_string(),
            ),
        );
        routes.insert(
            "/check".to_string(),
            (200, Vec::new(), "cookies: {cookies}".to_string()),
        );
        let addr = mock_server(routes).await;
        let endpoint = format!("http://{addr}");

        let mut set = ScenarioSet::new();
        set.push(resolved(
            Scenario::new("session")
                .step(Step::get("set", "/set").expect("status == 200"))
                .step(Step::get("check", "/check").expect("body contains 'sid=abc123'")),
            endpoint,
        ))
        .unwrap();

        let results = player(1).run(&set).await;
        assert!(!results.is_errored(), "{:?}", results.get("session"));
    }

    #[tokio::test]
    async fn cookie_jar_is_fresh_per_scenario_on_a_reused_handle() {
        let mut routes = HashMap::new();
        routes.insert(
            "/set".to_string(),
            (
                200,
                vec![("Set-Cookie".to_string(), "sid=abc123; Path=/".to_string())],
                "ok".to_string(),
            ),
        );
        routes.insert(
            "/check".to_string(),
            (200, Vec::new(), "cookies: {cookies}".to_string()),
        );
        let addr = mock_server(routes).await;
        let endpoint = format!("http://{addr}");

        let mut set = ScenarioSet::new();
        set.push(resolved(
            Scenario::new("first")
                .step(Step::get("set", "/set").expect("status == 200"))
                .step(Step::get("check", "/check").expect("body contains 'sid=abc123'")),
            endpoint.clone(),
        ))
        .unwrap();
        // Pool of one: the second scenario reuses the first's handle and
        // must not see its cookies.
        set.push(resolved(
            Scenario::new("second")
                .step(Step::get("check", "/check").expect("body not-contains 'sid=abc123'")),
            endpoint,
        ))
        .unwrap();

        let results = player(1).run(&set).await;

        assert!(
            results.get("first").unwrap().error.is_none(),
            "{:?}",
            results.get("first")
        );
        assert!(
            results.get("second").unwrap().error.is_none(),
            "cookie leaked: {:?}",
            results.get("second").unwrap().error
        );
    }

    #[tokio::test]
    async fn extracted_variables_reach_later_steps_only() {
        let mut routes = HashMap::new();
        routes.insert(
            "/token".to_string(),
            (200, Vec::new(), "token=tok42;".to_string()),
        );
        routes.insert(
            "/use-tok42".to_string(),
            (200, Vec::new(), "authorized".to_string()),
        );
        let addr = mock_server(routes).await;
        let endpoint = format!("http://{addr}");

        let mut set = ScenarioSet::new();
        set.push(resolved(
            Scenario::new("auth")
                .step(Step::get("fetch", "/token").extract("tok", r#"regex("token=(\w+);")"#))
                .step(Step::get("spend", "/use-{{ tok }}").expect("status == 200")),
            endpoint.clone(),
        ))
        .unwrap();
        // Sibling scenario must not see the extracted variable.
        set.push(resolved(
            Scenario::new("stranger").step(Step::get("spend", "/use-{{ tok }}")),
            endpoint,
        ))
        .unwrap();

        let results = player(1).run(&set).await;

        let auth = results.get("auth").unwrap();
        assert!(auth.error.is_none(), "{auth:?}");
        assert_eq!(auth.values.get("tok").unwrap(), "tok42");

        // Unknown variable in the sibling: recorded, scenario aborted.
        let stranger = results.get("stranger").unwrap();
        assert_eq!(stranger.severity(), Some(ErrorKind::NonFatal));
    }

    struct AlwaysAbort;

    impl Extension for AlwaysAbort {
        fn name(&self) -> &str {
            "always-abort"
        }

        fn on_step_before(&self, _scenario: &Scenario, _step: &Step) -> HookResult {
            Err(Abort::new("blocked by policy"))
        }
    }

    #[tokio::test]
    async fn extension_abort_converts_to_fatal() {
        let addr = mock_server(single_route("/", 200, "ok")).await;
        let endpoint = format!("http://{addr}");

        let mut pipeline = ExtensionPipeline::new();
        pipeline.register(0, Arc::new(AlwaysAbort));
        let player = Player::new(ClientPool::new(1, 5).unwrap(), pipeline);

        let mut set = ScenarioSet::new();
        set.push(resolved(
            Scenario::new("blocked").step(Step::get("visit", "/")),
            endpoint,
        ))
        .unwrap();

        let results = player.run(&set).await;

        let result = results.get("blocked").unwrap();
        assert_eq!(result.severity(), Some(ErrorKind::Fatal));
        assert!(result.error.as_ref().unwrap().message.contains("blocked by policy"));
        assert_eq!(results.exit_code(), 65);
    }

    #[tokio::test]
    async fn non_fatal_step_continues_after_failed_expectation() {
        let mut routes = HashMap::new();
        routes.insert("/a".to_string(), (500, Vec::new(), "bad".to_string()));
        routes.insert("/b".to_string(), (200, Vec::new(), "good".to_string()));
        let addr = mock_server(routes).await;
        let endpoint = format!("http://{addr}");

        let mut set = ScenarioSet::new();
        set.push(resolved(
            Scenario::new("tolerant")
                .step(Step::get("first", "/a").expect("status == 200").non_fatal())
                .step(Step::get("second", "/b").extract("outcome", "body")),
            endpoint,
        ))
        .unwrap();

        let results = player(1).run(&set).await;

        let result = results.get("tolerant").unwrap();
        // The expectation error is recorded but the second step still ran.
        assert_eq!(result.severity(), Some(ErrorKind::Expectation));
        assert_eq!(result.values.get("outcome").unwrap(), "good");
        assert_eq!(results.exit_code(), 64);
    }
}
