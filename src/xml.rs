// XML wire format: request builders and response parsers.
// Requests are tiny `<tsRequest>` documents serialized with serde through
// quick-xml. Responses are walked with the event reader; element names are
// matched on their local part and the document namespace is validated
// against an explicit constant handed to every parser (no shared state).

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;

use crate::error::{ApiError, Result};

/// Namespace every `tsResponse` document is declared in. Callers pass this
/// to the parse functions explicitly.
pub const TS_NAMESPACE: &str = "http://tableau.com/api";

// ── Request bodies ───────────────────────────────────────────────────────

/// `<tsRequest><credentials name=.. password=..><site contentUrl=../></credentials></tsRequest>`
#[derive(Serialize, Debug)]
#[serde(rename = "tsRequest")]
pub struct SignInRequest {
    pub credentials: Credentials,
}

#[derive(Serialize, Debug)]
pub struct Credentials {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@password")]
    pub password: String,
    pub site: SiteRef,
}

#[derive(Serialize, Debug)]
pub struct SiteRef {
    /// Empty string addresses the default site.
    #[serde(rename = "@contentUrl")]
    pub content_url: String,
}

/// `<tsRequest><workbook [name=..]><project id=../></workbook></tsRequest>`
/// The name attribute is set when publishing and omitted when moving.
#[derive(Serialize, Debug)]
#[serde(rename = "tsRequest")]
pub struct WorkbookRequest {
    pub workbook: WorkbookElement,
}

#[derive(Serialize, Debug)]
pub struct WorkbookElement {
    #[serde(rename = "@name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub project: ProjectRef,
}

#[derive(Serialize, Debug)]
pub struct ProjectRef {
    #[serde(rename = "@id")]
    pub id: String,
}

/// Serialize a request struct to its XML document string.
pub fn to_xml<T: Serialize>(value: &T) -> Result<String> {
    Ok(quick_xml::se::to_string(value)?)
}

// ── Parsed response shapes ───────────────────────────────────────────────

/// Fields pulled out of a successful sign-in response.
#[derive(Debug, Clone)]
pub struct SignInData {
    pub token: String,
    pub site_id: String,
    pub site_content_url: String,
    pub user_id: String,
}

#[derive(Debug, Clone)]
pub struct WorkbookSummary {
    pub id: String,
    pub name: String,
    /// ID of the project currently containing the workbook. The listing
    /// endpoint always nests one; only treated as an error if the workbook
    /// is actually selected.
    pub project_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
}

/// `<pagination pageNumber=.. pageSize=.. totalAvailable=../>` attributes.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub page_number: u64,
    pub page_size: u64,
    pub total_available: u64,
}

/// Server error body. Missing pieces fall back to the documented
/// placeholder strings.
#[derive(Debug, Clone)]
pub struct ErrorBody {
    pub code: String,
    pub summary: String,
    pub detail: String,
}

impl Default for ErrorBody {
    fn default() -> Self {
        ErrorBody {
            code: "unknown code".into(),
            summary: "unknown summary".into(),
            detail: "unknown detail".into(),
        }
    }
}

// ── Low-level helpers ────────────────────────────────────────────────────

/// Extract the local name from a possibly-prefixed XML tag.
fn local_name(raw: &[u8]) -> String {
    let s = String::from_utf8_lossy(raw);
    match s.rfind(':') {
        Some(pos) => s[pos + 1..].to_string(),
        None => s.to_string(),
    }
}

/// True when the element declares `ns` as a namespace (default or prefixed).
fn declares_namespace(e: &BytesStart, ns: &str) -> bool {
    e.attributes().flatten().any(|a| {
        let key = String::from_utf8_lossy(a.key.as_ref()).to_string();
        (key == "xmlns" || key.starts_with("xmlns:"))
            && a.unescape_value().map(|v| v == ns).unwrap_or(false)
    })
}

fn attr(e: &BytesStart, name: &str) -> Result<Option<String>> {
    match e.try_get_attribute(name) {
        Ok(Some(a)) => {
            let value = a.unescape_value().map_err(|err| {
                ApiError::MalformedResponse(format!("bad '{name}' attribute: {err}"))
            })?;
            Ok(Some(value.into_owned()))
        }
        Ok(None) => Ok(None),
        Err(err) => Err(ApiError::MalformedResponse(format!(
            "bad '{name}' attribute: {err}"
        ))),
    }
}

fn require_attr(e: &BytesStart, name: &str, element: &str) -> Result<String> {
    attr(e, name)?.filter(|v| !v.is_empty()).ok_or_else(|| {
        ApiError::MalformedResponse(format!("<{element}> is missing the '{name}' attribute"))
    })
}

fn numeric_attr(e: &BytesStart, name: &str, element: &str) -> Result<u64> {
    let raw = require_attr(e, name, element)?;
    raw.parse().map_err(|_| {
        ApiError::MalformedResponse(format!("<{element}> has a non-numeric '{name}': '{raw}'"))
    })
}

fn parse_error(context: &str, err: quick_xml::Error) -> ApiError {
    ApiError::MalformedResponse(format!("invalid XML in {context}: {err}"))
}

/// Check the document root: must be `tsResponse` declared in `ns`.
fn check_root(e: &BytesStart, ns: &str, context: &str) -> Result<()> {
    let name = local_name(e.name().as_ref());
    if name != "tsResponse" {
        return Err(ApiError::MalformedResponse(format!(
            "unexpected root element <{name}> in {context}"
        )));
    }
    if !declares_namespace(e, ns) {
        return Err(ApiError::MalformedResponse(format!(
            "{context} does not declare the expected namespace {ns}"
        )));
    }
    Ok(())
}

fn parse_pagination(e: &BytesStart) -> Result<Pagination> {
    Ok(Pagination {
        page_number: numeric_attr(e, "pageNumber", "pagination")?,
        page_size: numeric_attr(e, "pageSize", "pagination")?,
        total_available: numeric_attr(e, "totalAvailable", "pagination")?,
    })
}

// ── Response parsers ─────────────────────────────────────────────────────

/// Parse a sign-in response into token, site and user identifiers. All
/// three must be present and non-empty.
pub fn parse_sign_in(xml: &str, ns: &str) -> Result<SignInData> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut root_seen = false;
    let mut token: Option<String> = None;
    let mut site_id: Option<String> = None;
    let mut site_content_url = String::new();
    let mut user_id: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if !root_seen {
                    check_root(e, ns, "sign-in response")?;
                    root_seen = true;
                } else {
                    match local_name(e.name().as_ref()).as_str() {
                        "credentials" => token = attr(e, "token")?,
                        "site" => {
                            site_id = attr(e, "id")?;
                            if let Some(url) = attr(e, "contentUrl")? {
                                site_content_url = url;
                            }
                        }
                        "user" => user_id = attr(e, "id")?,
                        _ => {}
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(parse_error("sign-in response", err)),
            _ => {}
        }
        buf.clear();
    }

    let missing =
        |what: &str| ApiError::MalformedResponse(format!("sign-in response is missing {what}"));
    Ok(SignInData {
        token: token
            .filter(|v| !v.is_empty())
            .ok_or_else(|| missing("the token"))?,
        site_id: site_id
            .filter(|v| !v.is_empty())
            .ok_or_else(|| missing("the site id"))?,
        site_content_url,
        user_id: user_id
            .filter(|v| !v.is_empty())
            .ok_or_else(|| missing("the user id"))?,
    })
}

/// Parse one page of a workbook listing: the workbooks plus the pagination
/// element describing the full result set.
pub fn parse_workbook_page(xml: &str, ns: &str) -> Result<(Vec<WorkbookSummary>, Pagination)> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut root_seen = false;
    let mut workbooks = Vec::new();
    let mut pagination: Option<Pagination> = None;
    let mut current: Option<WorkbookSummary> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if !root_seen {
                    check_root(e, ns, "workbook listing")?;
                    root_seen = true;
                } else {
                    match local_name(e.name().as_ref()).as_str() {
                        "workbook" => {
                            current = Some(WorkbookSummary {
                                id: require_attr(e, "id", "workbook")?,
                                name: attr(e, "name")?.unwrap_or_default(),
                                project_id: None,
                            });
                        }
                        "project" => {
                            if let Some(wb) = current.as_mut() {
                                wb.project_id = attr(e, "id")?;
                            }
                        }
                        "pagination" => pagination = Some(parse_pagination(e)?),
                        _ => {}
                    }
                }
            }
            Ok(Event::Empty(ref e)) => match local_name(e.name().as_ref()).as_str() {
                "pagination" => pagination = Some(parse_pagination(e)?),
                "project" => {
                    if let Some(wb) = current.as_mut() {
                        wb.project_id = attr(e, "id")?;
                    }
                }
                "workbook" => {
                    workbooks.push(WorkbookSummary {
                        id: require_attr(e, "id", "workbook")?,
                        name: attr(e, "name")?.unwrap_or_default(),
                        project_id: None,
                    });
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => {
                if local_name(e.name().as_ref()) == "workbook" {
                    if let Some(wb) = current.take() {
                        workbooks.push(wb);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(parse_error("workbook listing", err)),
            _ => {}
        }
        buf.clear();
    }

    let pagination = pagination.ok_or_else(|| {
        ApiError::MalformedResponse("workbook listing is missing its pagination element".into())
    })?;
    Ok((workbooks, pagination))
}

/// Parse one page of the project listing.
pub fn parse_project_page(xml: &str, ns: &str) -> Result<(Vec<ProjectSummary>, Pagination)> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut root_seen = false;
    let mut projects = Vec::new();
    let mut pagination: Option<Pagination> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if !root_seen {
                    check_root(e, ns, "project listing")?;
                    root_seen = true;
                } else {
                    match local_name(e.name().as_ref()).as_str() {
                        "project" => projects.push(ProjectSummary {
                            id: require_attr(e, "id", "project")?,
                            name: attr(e, "name")?.unwrap_or_default(),
                        }),
                        "pagination" => pagination = Some(parse_pagination(e)?),
                        _ => {}
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(parse_error("project listing", err)),
            _ => {}
        }
        buf.clear();
    }

    let pagination = pagination.ok_or_else(|| {
        ApiError::MalformedResponse("project listing is missing its pagination element".into())
    })?;
    Ok((projects, pagination))
}

/// Parse the response to creating a file-upload session.
pub fn parse_upload_session(xml: &str, ns: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut root_seen = false;
    let mut upload_id: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if !root_seen {
                    check_root(e, ns, "file-upload response")?;
                    root_seen = true;
                } else if local_name(e.name().as_ref()) == "fileUpload" {
                    upload_id = attr(e, "uploadSessionId")?;
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(parse_error("file-upload response", err)),
            _ => {}
        }
        buf.clear();
    }

    upload_id.filter(|v| !v.is_empty()).ok_or_else(|| {
        ApiError::MalformedResponse("file-upload response is missing the upload session id".into())
    })
}

/// Best-effort parse of a non-success error body. Never fails: anything
/// missing or unparseable keeps its placeholder value.
pub fn parse_error_body(xml: &str) -> ErrorBody {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut body = ErrorBody::default();
    let mut text_target: Option<&'static str> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                match local_name(e.name().as_ref()).as_str() {
                    "error" => {
                        if let Ok(Some(code)) = attr(e, "code") {
                            if !code.is_empty() {
                                body.code = code;
                            }
                        }
                    }
                    "summary" => text_target = Some("summary"),
                    "detail" => text_target = Some("detail"),
                    _ => text_target = None,
                }
            }
            Ok(Event::Text(ref t)) => {
                if let Some(target) = text_target {
                    let text = t.unescape().unwrap_or_default().trim().to_string();
                    if !text.is_empty() {
                        match target {
                            "summary" => body.summary = text,
                            "detail" => body.detail = text,
                            _ => {}
                        }
                    }
                }
            }
            Ok(Event::End(_)) => text_target = None,
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGN_IN_OK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<tsResponse xmlns="http://tableau.com/api">
  <credentials token="12ab34cd56ef78ab90cd12ef34ab56cd">
    <site id="9a8b7c6d" contentUrl="marketing"/>
    <user id="1f2e3d4c"/>
  </credentials>
</tsResponse>"#;

    #[test]
    fn sign_in_response_yields_all_fields() {
        let data = parse_sign_in(SIGN_IN_OK, TS_NAMESPACE).unwrap();
        assert_eq!(data.token, "12ab34cd56ef78ab90cd12ef34ab56cd");
        assert_eq!(data.site_id, "9a8b7c6d");
        assert_eq!(data.site_content_url, "marketing");
        assert_eq!(data.user_id, "1f2e3d4c");
    }

    #[test]
    fn sign_in_missing_token_is_malformed() {
        let xml = r#"<tsResponse xmlns="http://tableau.com/api">
  <credentials><site id="9a8b" contentUrl=""/><user id="1f2e"/></credentials>
</tsResponse>"#;
        let err = parse_sign_in(xml, TS_NAMESPACE).unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse(_)));
    }

    #[test]
    fn sign_in_wrong_namespace_is_rejected() {
        let xml = r#"<tsResponse xmlns="http://example.com/other">
  <credentials token="t"><site id="s"/><user id="u"/></credentials>
</tsResponse>"#;
        assert!(parse_sign_in(xml, TS_NAMESPACE).is_err());
    }

    #[test]
    fn workbook_page_parses_nested_project() {
        let xml = r#"<tsResponse xmlns="http://tableau.com/api">
  <pagination pageNumber="1" pageSize="100" totalAvailable="2"/>
  <workbooks>
    <workbook id="wb-1" name="Sales">
      <project id="proj-1" name="ops"/>
      <owner id="user-1"/>
    </workbook>
    <workbook id="wb-2" name="Finance">
      <project id="proj-2" name="money"/>
      <owner id="user-1"/>
    </workbook>
  </workbooks>
</tsResponse>"#;
        let (workbooks, pagination) = parse_workbook_page(xml, TS_NAMESPACE).unwrap();
        assert_eq!(workbooks.len(), 2);
        assert_eq!(workbooks[0].id, "wb-1");
        assert_eq!(workbooks[0].name, "Sales");
        assert_eq!(workbooks[0].project_id.as_deref(), Some("proj-1"));
        assert_eq!(pagination.total_available, 2);
        assert_eq!(pagination.page_size, 100);
    }

    #[test]
    fn project_page_parses_items_and_pagination() {
        let xml = r#"<tsResponse xmlns="http://tableau.com/api">
  <pagination pageNumber="2" pageSize="100" totalAvailable="150"/>
  <projects>
    <project id="p-101" name="archive"/>
    <project id="p-102" name="Default"/>
  </projects>
</tsResponse>"#;
        let (projects, pagination) = parse_project_page(xml, TS_NAMESPACE).unwrap();
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[1].id, "p-102");
        assert_eq!(pagination.page_number, 2);
        assert_eq!(pagination.total_available, 150);
    }

    #[test]
    fn missing_pagination_is_malformed() {
        let xml = r#"<tsResponse xmlns="http://tableau.com/api"><projects/></tsResponse>"#;
        assert!(parse_project_page(xml, TS_NAMESPACE).is_err());
    }

    #[test]
    fn upload_session_id_is_extracted() {
        let xml = r#"<tsResponse xmlns="http://tableau.com/api">
  <fileUpload uploadSessionId="7644:1a2b3c" fileSize="0"/>
</tsResponse>"#;
        assert_eq!(
            parse_upload_session(xml, TS_NAMESPACE).unwrap(),
            "7644:1a2b3c"
        );
    }

    #[test]
    fn error_body_with_all_fields() {
        let xml = r#"<tsResponse xmlns="http://tableau.com/api">
  <error code="403"><summary>Forbidden</summary><detail>bad password</detail></error>
</tsResponse>"#;
        let body = parse_error_body(xml);
        assert_eq!(body.code, "403");
        assert_eq!(body.summary, "Forbidden");
        assert_eq!(body.detail, "bad password");
    }

    #[test]
    fn error_body_substitutes_placeholders() {
        let body = parse_error_body("<tsResponse><error/></tsResponse>");
        assert_eq!(body.code, "unknown code");
        assert_eq!(body.summary, "unknown summary");
        assert_eq!(body.detail, "unknown detail");

        let garbage = parse_error_body("this is not xml <<<");
        assert_eq!(garbage.code, "unknown code");
    }

    #[test]
    fn sign_in_request_serializes_credentials() {
        let body = to_xml(&SignInRequest {
            credentials: Credentials {
                name: "alice".into(),
                password: r#"s3"cret"#.into(),
                site: SiteRef {
                    content_url: String::new(),
                },
            },
        })
        .unwrap();
        assert!(body.starts_with("<tsRequest>"));
        assert!(body.ends_with("</tsRequest>"));
        assert!(body.contains(r#"name="alice""#));
        // quotes in attribute values must be escaped
        assert!(body.contains("&quot;"));
        assert!(body.contains("contentUrl"));
    }

    #[test]
    fn move_request_omits_name_attribute() {
        let body = to_xml(&WorkbookRequest {
            workbook: WorkbookElement {
                name: None,
                project: ProjectRef { id: "p-9".into() },
            },
        })
        .unwrap();
        assert!(!body.contains("name="));
        assert!(body.contains(r#"id="p-9""#));
    }

    #[test]
    fn publish_request_carries_workbook_name() {
        let body = to_xml(&WorkbookRequest {
            workbook: WorkbookElement {
                name: Some("quarterly".into()),
                project: ProjectRef { id: "p-1".into() },
            },
        })
        .unwrap();
        assert!(body.contains(r#"name="quarterly""#));
    }
}
