//! Minimal W3C WebDriver client.
//!
//! Enough of the protocol to drive the pipeline: create a session, navigate,
//! find elements, read text and attributes, execute a script and delete the
//! session. Works against a local chromedriver or a remote grid such as
//! BrowserStack (basic-auth credentials, `bstack:options` capabilities).
//!
//! # Endpoints
//!
//! | Command | Method | Path |
//! |---------|--------|------|
//! | New session | POST | `/session` |
//! | Navigate | POST | `/session/{id}/url` |
//! | Find elements | POST | `/session/{id}/elements` |
//! | Find child element(s) | POST | `/session/{id}/element/{eid}/element[s]` |
//! | Element text | GET | `/session/{id}/element/{eid}/text` |
//! | Element attribute | GET | `/session/{id}/element/{eid}/attribute/{name}` |
//! | Execute script | POST | `/session/{id}/execute/sync` |
//! | Delete session | DELETE | `/session/{id}` |

use super::{Automation, Element, Session};
use crate::error::{Error, Result};
use crate::models::{EnvironmentConfig, Status, Target};
use crate::utils::truncate_for_log;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::{Map, Value, json};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// W3C WebDriver web element identifier key.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// BrowserStack Automate hub.
pub const BROWSERSTACK_HUB_URL: &str = "https://hub-cloud.browserstack.com/wd/hub";

const COMMAND_TIMEOUT: Duration = Duration::from_secs(120);
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub access_key: String,
}

/// Grid metadata attached to every remote session.
#[derive(Debug, Clone)]
pub struct GridOptions {
    pub project_name: String,
    pub build_name: String,
}

/// Opens WebDriver sessions against one endpoint.
#[derive(Debug, Clone)]
pub struct WebDriverAutomation {
    client: Client,
    handle: Handle,
    endpoint: String,
    credentials: Option<Credentials>,
    grid: GridOptions,
}

impl WebDriverAutomation {
    /// Must be called from inside a tokio runtime.
    pub fn new(endpoint: &str, credentials: Option<Credentials>, grid: GridOptions) -> Result<Self> {
        let parsed = Url::parse(endpoint)?;
        let client = Client::builder().timeout(COMMAND_TIMEOUT).build()?;
        Ok(Self {
            client,
            handle: Handle::current(),
            endpoint: parsed.as_str().trim_end_matches('/').to_string(),
            credentials,
            grid,
        })
    }
}

impl Automation for WebDriverAutomation {
    #[instrument(level = "info", skip_all, fields(environment = %config.name))]
    fn open_session(&self, config: &EnvironmentConfig) -> Result<Box<dyn Session>> {
        let acquisition = |reason: String| Error::SessionAcquisition {
            environment: config.name.clone(),
            reason,
        };

        if config.target == Target::Remote {
            match &self.credentials {
                Some(c) if !c.username.is_empty() && !c.access_key.is_empty() => {}
                _ => return Err(acquisition("grid credentials are not set".to_string())),
            }
        }

        let capabilities = capabilities_for(config, self.credentials.as_ref(), &self.grid);
        debug!(%capabilities, "Requesting WebDriver session");

        let connection = Connection {
            client: self.client.clone(),
            handle: self.handle.clone(),
            endpoint: self.endpoint.clone(),
            credentials: self.credentials.clone(),
        };
        let value = connection
            .command(
                Method::POST,
                "session",
                Some(json!({ "capabilities": { "alwaysMatch": capabilities } })),
            )
            .map_err(|e| acquisition(e.to_string()))?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| acquisition("response carried no sessionId".to_string()))?
            .to_string();

        info!(%session_id, label = %config.label(), "WebDriver session started");
        Ok(Box::new(WebDriverSession {
            connection,
            session_id,
            report_to_grid: config.target == Target::Remote,
            closed: false,
        }))
    }
}

/// Build the `alwaysMatch` capabilities for an environment.
///
/// Remote environments get a `bstack:options` block; local Chrome gets a
/// Spanish language preference so the section renders in its native form.
pub fn capabilities_for(
    config: &EnvironmentConfig,
    credentials: Option<&Credentials>,
    grid: &GridOptions,
) -> Value {
    let browser_name = config.browser_name().to_lowercase();
    let mut caps = Map::new();
    caps.insert("browserName".into(), json!(browser_name));
    if let Some(version) = config.capability("browserVersion") {
        caps.insert("browserVersion".into(), json!(version));
    }

    match config.target {
        Target::Local => {
            if browser_name == "chrome" {
                caps.insert(
                    "goog:chromeOptions".into(),
                    json!({
                        "args": ["--lang=es"],
                        "prefs": { "intl.accept_languages": "es,es-ES" }
                    }),
                );
            }
        }
        Target::Remote => {
            let platform = config
                .capability("device")
                .or_else(|| config.capability("os_version"))
                .unwrap_or("Desktop");
            let mut bstack = Map::new();
            if let Some(c) = credentials {
                bstack.insert("userName".into(), json!(c.username));
                bstack.insert("accessKey".into(), json!(c.access_key));
            }
            bstack.insert("projectName".into(), json!(grid.project_name));
            bstack.insert("buildName".into(), json!(grid.build_name));
            bstack.insert(
                "sessionName".into(),
                json!(format!("El Pais Opinion - {} ({})", config.browser_name(), platform)),
            );
            for (ours, theirs) in [
                ("os", "os"),
                ("os_version", "osVersion"),
                ("device", "deviceName"),
                ("realMobile", "realMobile"),
            ] {
                if let Some(v) = config.capability(ours) {
                    bstack.insert(theirs.into(), json!(v));
                }
            }
            caps.insert("bstack:options".into(), Value::Object(bstack));
        }
    }
    Value::Object(caps)
}

/// The script BrowserStack interprets as a session status update.
pub fn status_script(status: Status, reason: &str) -> String {
    let payload = json!({
        "action": "setSessionStatus",
        "arguments": { "status": status.as_str(), "reason": reason }
    });
    format!("browserstack_executor: {payload}")
}

#[derive(Debug, Clone)]
struct Connection {
    client: Client,
    handle: Handle,
    endpoint: String,
    credentials: Option<Credentials>,
}

impl Connection {
    /// Issue one command and return the `value` member of the response.
    fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}/{}", self.endpoint, path);
        let mut request: RequestBuilder = self.client.request(method, &url);
        if let Some(c) = &self.credentials {
            request = request.basic_auth(&c.username, Some(&c.access_key));
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let (status, body) = self.handle.block_on(async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, Error>((status, body))
        })?;
        decode_response(status, &body)
    }
}

/// Split a WebDriver response into its `value` member or an
/// [`Error::WebDriver`]. Bodies that are not JSON (a proxy's plain-text 401,
/// say) keep the HTTP status in the error.
fn decode_response(status: StatusCode, body: &str) -> Result<Value> {
    let mut payload: Value = match serde_json::from_str(body) {
        Ok(payload) => payload,
        Err(_) if status.is_success() => {
            return Err(Error::WebDriver {
                code: "invalid response".to_string(),
                message: format!("HTTP {status}: {}", truncate_for_log(body, 200)),
            });
        }
        Err(_) => {
            return Err(Error::WebDriver {
                code: format!("HTTP {}", status.as_u16()),
                message: truncate_for_log(body.trim(), 200),
            });
        }
    };
    let value = payload.get_mut("value").map(Value::take).unwrap_or(Value::Null);

    if status.is_success() {
        return Ok(value);
    }
    let code = value
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Err(Error::WebDriver { code, message })
}

struct WebDriverSession {
    connection: Connection,
    session_id: String,
    report_to_grid: bool,
    closed: bool,
}

impl WebDriverSession {
    fn path(&self, rest: &str) -> String {
        format!("session/{}/{}", self.session_id, rest)
    }

    fn find(&self, path: &str, selector: &str) -> Result<Value> {
        self.connection.command(
            Method::POST,
            &self.path(path),
            Some(json!({ "using": "css selector", "value": selector })),
        )
    }

    fn elements<'s>(&'s self, value: &Value) -> Vec<Box<dyn Element + 's>> {
        value
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(element_id)
            .map(|id| Box::new(WebDriverElement { session: self, id }) as Box<dyn Element + 's>)
            .collect()
    }
}

impl Session for WebDriverSession {
    #[instrument(level = "info", skip(self))]
    fn navigate(&mut self, url: &str) -> Result<()> {
        self.connection
            .command(Method::POST, &self.path("url"), Some(json!({ "url": url })))?;
        Ok(())
    }

    fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool> {
        let started = Instant::now();
        loop {
            let found = self.find("elements", selector)?;
            if found.as_array().is_some_and(|a| !a.is_empty()) {
                return Ok(true);
            }
            if started.elapsed() >= timeout {
                return Ok(false);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn Element + '_>>> {
        let found = self.find("elements", selector)?;
        Ok(self.elements(&found))
    }

    fn report_status(&mut self, status: Status, reason: &str) -> Result<()> {
        if !self.report_to_grid {
            return Ok(());
        }
        self.connection.command(
            Method::POST,
            &self.path("execute/sync"),
            Some(json!({ "script": status_script(status, reason), "args": [] })),
        )?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.connection
            .command(Method::DELETE, &format!("session/{}", self.session_id), None)?;
        info!(session_id = %self.session_id, "WebDriver session closed");
        Ok(())
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close() {
                warn!(session_id = %self.session_id, error = %e, "Failed to close WebDriver session on drop");
            }
        }
    }
}

struct WebDriverElement<'s> {
    session: &'s WebDriverSession,
    id: String,
}

impl WebDriverElement<'_> {
    fn path(&self, rest: &str) -> String {
        self.session.path(&format!("element/{}/{}", self.id, rest))
    }
}

impl Element for WebDriverElement<'_> {
    fn query_one(&self, selector: &str) -> Result<Option<Box<dyn Element + '_>>> {
        match self
            .session
            .find(&format!("element/{}/element", self.id), selector)
        {
            Ok(value) => Ok(element_id(&value).map(|id| {
                Box::new(WebDriverElement {
                    session: self.session,
                    id,
                }) as Box<dyn Element + '_>
            })),
            Err(e) if e.is_no_such_element() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn Element + '_>>> {
        let found = self
            .session
            .find(&format!("element/{}/elements", self.id), selector)?;
        Ok(self.session.elements(&found))
    }

    fn text(&self) -> Result<String> {
        let value = self
            .session
            .connection
            .command(Method::GET, &self.path("text"), None)?;
        Ok(value
            .as_str()
            .unwrap_or_default()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" "))
    }

    fn attribute(&self, name: &str) -> Result<Option<String>> {
        let path = self.path(&format!("attribute/{}", urlencoding::encode(name)));
        let value = self.session.connection.command(Method::GET, &path, None)?;
        Ok(value.as_str().map(str::to_string))
    }
}

fn element_id(value: &Value) -> Option<String> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn grid() -> GridOptions {
        GridOptions {
            project_name: "El Pais Scraper".to_string(),
            build_name: "build-1".to_string(),
        }
    }

    fn config(target: Target, pairs: &[(&str, &str)]) -> EnvironmentConfig {
        EnvironmentConfig {
            name: "env".to_string(),
            target,
            capabilities: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_remote_capabilities_map_grid_keys() {
        let cfg = config(
            Target::Remote,
            &[
                ("browserName", "chrome"),
                ("device", "Samsung Galaxy S22"),
                ("os", "android"),
                ("realMobile", "true"),
            ],
        );
        let creds = Credentials {
            username: "user".to_string(),
            access_key: "key".to_string(),
        };
        let caps = capabilities_for(&cfg, Some(&creds), &grid());

        assert_eq!(caps["browserName"], "chrome");
        let bstack = &caps["bstack:options"];
        assert_eq!(bstack["userName"], "user");
        assert_eq!(bstack["accessKey"], "key");
        assert_eq!(bstack["deviceName"], "Samsung Galaxy S22");
        assert_eq!(bstack["realMobile"], "true");
        assert_eq!(bstack["buildName"], "build-1");
        assert_eq!(
            bstack["sessionName"],
            "El Pais Opinion - chrome (Samsung Galaxy S22)"
        );
        assert!(bstack.get("osVersion").is_none());
    }

    #[test]
    fn test_remote_capabilities_desktop() {
        let cfg = config(
            Target::Remote,
            &[
                ("browserName", "ie"),
                ("browserVersion", "11.0"),
                ("os", "Windows"),
                ("os_version", "7"),
            ],
        );
        let caps = capabilities_for(&cfg, None, &grid());
        assert_eq!(caps["browserVersion"], "11.0");
        assert_eq!(caps["bstack:options"]["osVersion"], "7");
        assert_eq!(caps["bstack:options"]["sessionName"], "El Pais Opinion - ie (7)");
        assert!(caps["bstack:options"].get("userName").is_none());
    }

    #[test]
    fn test_local_chrome_prefers_spanish() {
        let cfg = config(Target::Local, &[("browserName", "Chrome")]);
        let caps = capabilities_for(&cfg, None, &grid());
        assert_eq!(caps["browserName"], "chrome");
        assert_eq!(caps["goog:chromeOptions"]["args"][0], "--lang=es");
        assert!(caps.get("bstack:options").is_none());
    }

    #[test]
    fn test_status_script_escapes_reason() {
        let script = status_script(Status::Failed, r#"Test failed: bad "quote""#);
        let json_part = script.strip_prefix("browserstack_executor: ").unwrap();
        let parsed: Value = serde_json::from_str(json_part).unwrap();
        assert_eq!(parsed["action"], "setSessionStatus");
        assert_eq!(parsed["arguments"]["status"], "failed");
        assert_eq!(parsed["arguments"]["reason"], r#"Test failed: bad "quote""#);
    }

    #[test]
    fn test_element_id_extraction() {
        let value = json!({ (ELEMENT_KEY): "abc-123" });
        assert_eq!(element_id(&value).as_deref(), Some("abc-123"));
        assert_eq!(element_id(&json!({ "other": 1 })), None);
    }

    fn credentials() -> Credentials {
        Credentials {
            username: "user".to_string(),
            access_key: "key".to_string(),
        }
    }

    async fn mount_new_session(server: &MockServer, session_id: &str) {
        Mock::given(method("POST"))
            .and(path("/session"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "value": { "sessionId": session_id, "capabilities": {} } })),
            )
            .mount(server)
            .await;
    }

    #[test]
    fn test_decode_response() {
        let ok = decode_response(StatusCode::OK, r#"{"value":[1,2]}"#).unwrap();
        assert_eq!(ok, json!([1, 2]));

        let stale = decode_response(
            StatusCode::NOT_FOUND,
            r#"{"value":{"error":"stale element reference","message":"detached"}}"#,
        )
        .unwrap_err();
        assert!(matches!(
            &stale,
            Error::WebDriver { code, message } if code == "stale element reference" && message == "detached"
        ));
        assert!(!stale.is_no_such_element());

        let plain = decode_response(StatusCode::UNAUTHORIZED, "Unauthorized\n").unwrap_err();
        assert!(matches!(
            &plain,
            Error::WebDriver { code, message } if code == "HTTP 401" && message == "Unauthorized"
        ));

        let garbled = decode_response(StatusCode::OK, "<html>").unwrap_err();
        assert!(garbled.to_string().contains("invalid response"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_remote_session_over_http() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/session"))
            .and(header("authorization", "Basic dXNlcjprZXk="))
            .and(body_partial_json(json!({
                "capabilities": { "alwaysMatch": {
                    "browserName": "firefox",
                    "bstack:options": { "userName": "user", "projectName": "El Pais Scraper" }
                } }
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "value": { "sessionId": "s1", "capabilities": {} } })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/session/s1/elements"))
            .and(body_partial_json(json!({ "using": "css selector", "value": "article" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [ { (ELEMENT_KEY): "e1" }, { (ELEMENT_KEY): "e2" } ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/session/s1/element/e1/element"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "value": { "error": "no such element", "message": "Unable to locate element" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/session/s1/element/e2/text"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "value": "  La   tormenta\n " })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/session/s1/element/e2/attribute/data-src"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/session/s1/execute/sync"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/session/s1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
            .expect(1)
            .mount(&server)
            .await;

        let automation = WebDriverAutomation::new(&server.uri(), Some(credentials()), grid()).unwrap();
        let (count, heading_missing, text, attribute) = tokio::task::spawn_blocking(move || {
            let cfg = config(Target::Remote, &[("browserName", "firefox")]);
            let mut session = automation.open_session(&cfg).unwrap();
            let observed = {
                let nodes = session.query_all("article").unwrap();
                (
                    nodes.len(),
                    nodes[0].query_one("h2").unwrap().is_none(),
                    nodes[1].text().unwrap(),
                    nodes[1].attribute("data-src").unwrap(),
                )
            };
            session.report_status(Status::Passed, "Test completed successfully").unwrap();
            session.close().unwrap();
            session.close().unwrap();
            drop(session);
            observed
        })
        .await
        .unwrap();

        assert_eq!(count, 2);
        assert!(heading_missing);
        assert_eq!(text, "La tormenta");
        assert_eq!(attribute, None);

        let requests = server.received_requests().await.unwrap();
        let status_call = requests
            .iter()
            .find(|r| r.url.path() == "/session/s1/execute/sync")
            .unwrap();
        let body: Value = serde_json::from_slice(&status_call.body).unwrap();
        assert_eq!(
            body["script"],
            status_script(Status::Passed, "Test completed successfully")
        );
        server.verify().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dropped_session_is_deleted_once() {
        let server = MockServer::start().await;
        mount_new_session(&server, "s2").await;
        Mock::given(method("DELETE"))
            .and(path("/session/s2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
            .expect(1)
            .mount(&server)
            .await;

        let automation = WebDriverAutomation::new(&server.uri(), None, grid()).unwrap();
        tokio::task::spawn_blocking(move || {
            let cfg = config(Target::Local, &[("browserName", "chrome")]);
            let session = automation.open_session(&cfg).unwrap();
            drop(session);
        })
        .await
        .unwrap();

        server.verify().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stale_child_lookup_is_an_error() {
        let server = MockServer::start().await;
        mount_new_session(&server, "s3").await;
        Mock::given(method("POST"))
            .and(path("/session/s3/elements"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "value": [ { (ELEMENT_KEY): "e9" } ] })),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/session/s3/element/e9/element"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "value": { "error": "stale element reference", "message": "detached" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/session/s3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
            .mount(&server)
            .await;

        let automation = WebDriverAutomation::new(&server.uri(), None, grid()).unwrap();
        let err = tokio::task::spawn_blocking(move || {
            let cfg = config(Target::Local, &[]);
            let mut session = automation.open_session(&cfg).unwrap();
            let err = {
                let nodes = session.query_all("article").unwrap();
                nodes[0].query_one("h2").err().unwrap()
            };
            session.close().unwrap();
            err
        })
        .await
        .unwrap();

        assert!(matches!(err, Error::WebDriver { ref code, .. } if code == "stale element reference"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_plain_text_rejection_keeps_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let automation = WebDriverAutomation::new(&server.uri(), Some(credentials()), grid()).unwrap();
        let err = tokio::task::spawn_blocking(move || {
            let cfg = config(Target::Remote, &[("browserName", "edge")]);
            automation.open_session(&cfg).err().unwrap()
        })
        .await
        .unwrap();

        assert!(matches!(err, Error::SessionAcquisition { .. }));
        assert!(err.to_string().contains("HTTP 401"), "{err}");
        assert!(err.to_string().contains("Unauthorized"), "{err}");
    }

    #[tokio::test]
    async fn test_remote_without_credentials_fails_acquisition() {
        let automation = WebDriverAutomation::new(BROWSERSTACK_HUB_URL, None, grid()).unwrap();
        let cfg = config(Target::Remote, &[("browserName", "firefox")]);
        let err = automation.open_session(&cfg).err().unwrap();
        assert!(matches!(err, Error::SessionAcquisition { .. }));
    }
}
