// Workbook operations: name→ID lookups with pagination, download to a
// staging file, all-in-one or chunked publish, move and delete.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::{Method, StatusCode};
use tracing::debug;

use crate::api::{check_status, ApiClient};
use crate::error::{ApiError, Result};
use crate::session::Session;
use crate::xml::{
    self, Pagination, ProjectRef, ProjectSummary, WorkbookElement, WorkbookRequest, TS_NAMESPACE,
};

/// Largest file published in a single request; anything bigger is chunked.
pub const FILESIZE_LIMIT: u64 = 64 * 1024 * 1024;

/// Chunk size for the append-to-upload-session requests.
pub const CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Page size requested from the paginated listing endpoints.
pub const PAGE_SIZE: u64 = 100;

/// Workbook and project operations for one signed-in session.
pub struct WorkbookMgr<'a> {
    client: &'a ApiClient,
    session: &'a Session,
}

impl<'a> WorkbookMgr<'a> {
    pub fn new(client: &'a ApiClient, session: &'a Session) -> Self {
        // A token is only valid against the server that issued it.
        debug_assert_eq!(client.server(), session.server());
        WorkbookMgr { client, session }
    }

    fn site_path(&self, rest: &str) -> String {
        format!("sites/{}/{}", self.session.site_id(), rest)
    }

    // ── Lookups ──────────────────────────────────────────────────────────

    /// Resolve a workbook owned by `user_id` by exact (case-sensitive)
    /// name. Returns `(project_id, workbook_id)`. The listing is walked
    /// page by page so owners with more than one page of workbooks still
    /// resolve correctly.
    pub fn find_workbook_by_name(&self, user_id: &str, name: &str) -> Result<(String, String)> {
        let path = self.site_path(&format!("users/{user_id}/workbooks"));
        let workbooks = self.fetch_all_pages(&path, xml::parse_workbook_page)?;
        debug!("listed {} workbook(s) for user {user_id}", workbooks.len());

        let workbook = workbooks
            .into_iter()
            .find(|wb| wb.name == name)
            .ok_or_else(|| ApiError::NotFound(format!("Workbook named '{name}' not found")))?;
        let project_id = workbook.project_id.ok_or_else(|| {
            ApiError::MalformedResponse(format!(
                "workbook '{name}' listing has no containing project"
            ))
        })?;
        Ok((project_id, workbook.id))
    }

    /// Resolve a project by exact name.
    pub fn find_project_by_name(&self, name: &str) -> Result<String> {
        let projects = self.fetch_projects()?;
        projects
            .into_iter()
            .find(|p| p.name == name)
            .map(|p| p.id)
            .ok_or_else(|| {
                ApiError::NotFound(format!("Project named '{name}' was not found on server"))
            })
    }

    /// Resolve the site's default project ("default"/"Default",
    /// case-insensitive). Exactly one such project must exist.
    pub fn find_default_project_id(&self) -> Result<String> {
        let projects = self.fetch_projects()?;
        default_project_from(&projects)
    }

    fn fetch_projects(&self) -> Result<Vec<ProjectSummary>> {
        let path = self.site_path("projects");
        let projects = self.fetch_all_pages(&path, xml::parse_project_page)?;
        debug!("listed {} project(s) on the site", projects.len());
        Ok(projects)
    }

    /// Fetch every page of a listing endpoint and accumulate the items.
    /// The page count comes from the first response's reported total; a
    /// reported page size of zero falls back to the requested size, and an
    /// empty page always terminates the loop, so a server misreporting its
    /// totals cannot make this spin forever.
    fn fetch_all_pages<T>(
        &self,
        path: &str,
        parse: fn(&str, &str) -> Result<(Vec<T>, Pagination)>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1u64;
        loop {
            let url = self
                .client
                .url(&format!("{path}?pageSize={PAGE_SIZE}&pageNumber={page}"));
            let response = check_status(
                self.client.get(&url, self.session.token())?,
                StatusCode::OK,
            )?;
            let (mut batch, pagination) = parse(&response.text()?, TS_NAMESPACE)?;
            let batch_was_empty = batch.is_empty();
            items.append(&mut batch);

            let page_size = if pagination.page_size == 0 {
                PAGE_SIZE
            } else {
                pagination.page_size
            };
            if batch_was_empty || page >= pages_needed(pagination.total_available, page_size) {
                break;
            }
            page += 1;
        }
        Ok(items)
    }

    // ── Move / delete ────────────────────────────────────────────────────

    /// Move the workbook into another project on the same site. This is a
    /// metadata update; no file transfer happens.
    pub fn move_workbook(&self, workbook_id: &str, project_id: &str) -> Result<()> {
        let body = xml::to_xml(&WorkbookRequest {
            workbook: WorkbookElement {
                name: None,
                project: ProjectRef {
                    id: project_id.to_string(),
                },
            },
        })?;
        let url = self.client.url(&self.site_path(&format!("workbooks/{workbook_id}")));
        let response = self.client.put_xml(&url, body, self.session.token())?;
        check_status(response, StatusCode::OK)?;
        Ok(())
    }

    /// Delete the workbook on the server (expects 204), then remove the
    /// local staging file. Runs only after the destination publish
    /// succeeded, so this is commit cleanup rather than rollback.
    pub fn delete_workbook(&self, workbook_id: &str, staged: StagedWorkbook) -> Result<()> {
        let url = self.client.url(&self.site_path(&format!("workbooks/{workbook_id}")));
        let response = self.client.delete(&url, self.session.token())?;
        check_status(response, StatusCode::NO_CONTENT)?;
        staged.remove()?;
        Ok(())
    }

    // ── Download ─────────────────────────────────────────────────────────

    /// Download the workbook content to a staging file in the working
    /// directory, named from the `Content-Disposition` header. The
    /// returned guard removes the file when dropped, so error paths clean
    /// up without extra bookkeeping.
    pub fn download(&self, workbook_id: &str) -> Result<StagedWorkbook> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
        spinner.set_message("Downloading workbook to a staging file...");

        let url = self
            .client
            .url(&self.site_path(&format!("workbooks/{workbook_id}/content")));
        let response = check_status(self.client.get(&url, self.session.token())?, StatusCode::OK)
            .map_err(|e| e.into_transfer())?;

        let disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                ApiError::Transfer(
                    "download response is missing the Content-Disposition header".into(),
                )
            })?;
        let filename = filename_from_disposition(&disposition).ok_or_else(|| {
            ApiError::Transfer(format!(
                "could not extract a filename from Content-Disposition '{disposition}'"
            ))
        })?;

        let bytes = response.bytes()?;
        fs::write(&filename, &bytes)?;
        spinner.finish_and_clear();
        debug!("downloaded {} byte(s) to {filename}", bytes.len());
        Ok(StagedWorkbook::new(PathBuf::from(filename)))
    }

    // ── Publish ──────────────────────────────────────────────────────────

    /// Publish the staged workbook into `dest_project_id`, picking the
    /// all-in-one or chunked strategy by file size. Any failed request
    /// aborts the publish; a chunked upload session left behind on the
    /// server is not discarded.
    pub fn publish(&self, staged: &StagedWorkbook, dest_project_id: &str) -> Result<()> {
        let filename = staged.file_name()?;
        let (workbook_name, workbook_type) = split_workbook_filename(&filename)?;
        let size = fs::metadata(staged.path())?.len();

        let descriptor = xml::to_xml(&WorkbookRequest {
            workbook: WorkbookElement {
                name: Some(workbook_name.to_string()),
                project: ProjectRef {
                    id: dest_project_id.to_string(),
                },
            },
        })?;

        if needs_chunking(size) {
            debug!("publishing '{workbook_name}' in chunks ({size} bytes)");
            self.publish_chunked(staged, descriptor, workbook_type, size)
        } else {
            debug!("publishing '{workbook_name}' all-in-one ({size} bytes)");
            self.publish_all_in_one(staged, descriptor, &filename, workbook_type)
        }
    }

    fn publish_all_in_one(
        &self,
        staged: &StagedWorkbook,
        descriptor: String,
        filename: &str,
        workbook_type: &str,
    ) -> Result<()> {
        let bytes = fs::read(staged.path())?;
        let form = Form::new()
            .part("request_payload", Part::text(descriptor).mime_str("text/xml")?)
            .part(
                "tableau_workbook",
                Part::bytes(bytes)
                    .file_name(filename.to_string())
                    .mime_str("application/octet-stream")?,
            );
        let url = self.client.url(&self.site_path(&format!(
            "workbooks?workbookType={workbook_type}&overwrite=true"
        )));
        let response = self
            .client
            .send_multipart(Method::POST, &url, self.session.token(), form)?;
        check_status(response, StatusCode::CREATED).map_err(|e| e.into_transfer())?;
        Ok(())
    }

    fn publish_chunked(
        &self,
        staged: &StagedWorkbook,
        descriptor: String,
        workbook_type: &str,
        size: u64,
    ) -> Result<()> {
        let upload_id = self.start_upload_session()?;
        let put_url = self
            .client
            .url(&self.site_path(&format!("fileUploads/{upload_id}")));

        let progress = ProgressBar::new(chunk_count(size));
        progress
            .set_style(ProgressStyle::with_template("{bar:30} {pos}/{len} chunks").unwrap());

        let mut file = File::open(staged.path())?;
        let mut buf = vec![0u8; CHUNK_SIZE as usize];
        loop {
            let n = read_chunk(&mut file, &mut buf)?;
            if n == 0 {
                break;
            }
            let form = Form::new()
                .part("request_payload", Part::text("").mime_str("text/xml")?)
                .part(
                    "tableau_file",
                    Part::bytes(buf[..n].to_vec())
                        .file_name("file")
                        .mime_str("application/octet-stream")?,
                );
            let response = self
                .client
                .send_multipart(Method::PUT, &put_url, self.session.token(), form)?;
            check_status(response, StatusCode::OK).map_err(|e| e.into_transfer())?;
            progress.inc(1);
            if n < buf.len() {
                break;
            }
        }
        progress.finish_and_clear();

        // Finalize: descriptor only, no file bytes.
        let form = Form::new().part("request_payload", Part::text(descriptor).mime_str("text/xml")?);
        let url = self.client.url(&self.site_path(&format!(
            "workbooks?uploadSessionId={upload_id}&workbookType={workbook_type}&overwrite=true"
        )));
        let response = self
            .client
            .send_multipart(Method::POST, &url, self.session.token(), form)?;
        check_status(response, StatusCode::CREATED).map_err(|e| e.into_transfer())?;
        Ok(())
    }

    /// Open a server-side file-upload session and return its ID.
    fn start_upload_session(&self) -> Result<String> {
        let url = self.client.url(&self.site_path("fileUploads"));
        let response = self.client.post_empty(&url, self.session.token())?;
        let response =
            check_status(response, StatusCode::CREATED).map_err(|e| e.into_transfer())?;
        xml::parse_upload_session(&response.text()?, TS_NAMESPACE)
    }
}

/// A downloaded workbook on local disk. Dropping the guard removes the
/// file, so it disappears on every exit path; `remove` deletes it
/// eagerly and reports errors.
pub struct StagedWorkbook {
    path: PathBuf,
}

impl StagedWorkbook {
    fn new(path: PathBuf) -> Self {
        StagedWorkbook { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bare file name of the staging file.
    pub fn file_name(&self) -> Result<String> {
        self.path
            .file_name()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                ApiError::Transfer(format!(
                    "staging path '{}' has no usable file name",
                    self.path.display()
                ))
            })
    }

    /// Remove the staging file now, surfacing any I/O error.
    pub fn remove(mut self) -> std::io::Result<()> {
        let path = std::mem::take(&mut self.path);
        fs::remove_file(path)
    }
}

impl Drop for StagedWorkbook {
    fn drop(&mut self) {
        if !self.path.as_os_str().is_empty() {
            let _ = fs::remove_file(&self.path);
        }
    }
}

// ── Pure helpers ─────────────────────────────────────────────────────────

/// Files at or above the limit go through the chunked upload path.
pub(crate) fn needs_chunking(size: u64) -> bool {
    size >= FILESIZE_LIMIT
}

/// Number of append requests a chunked upload of `size` bytes issues.
pub(crate) fn chunk_count(size: u64) -> u64 {
    size.div_ceil(CHUNK_SIZE)
}

fn pages_needed(total_available: u64, page_size: u64) -> u64 {
    total_available.div_ceil(page_size)
}

/// Extract the quoted filename from a `Content-Disposition` header value,
/// e.g. `name="tableau_workbook"; filename="report.twbx"`. The name must
/// be a bare file name; anything path-like is rejected.
fn filename_from_disposition(value: &str) -> Option<String> {
    let start = value.find("filename=\"")? + "filename=\"".len();
    let rest = &value[start..];
    let end = rest.rfind('"')?;
    let name = &rest[..end];
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return None;
    }
    Some(name.to_string())
}

/// Split a workbook filename at the first dot into name and type, e.g.
/// `quarterly.twbx` → (`quarterly`, `twbx`).
fn split_workbook_filename(filename: &str) -> Result<(&str, &str)> {
    let mut parts = filename.splitn(2, '.');
    let name = parts.next().unwrap_or_default();
    match parts.next() {
        Some(ext) if !name.is_empty() && !ext.is_empty() => Ok((name, ext)),
        _ => Err(ApiError::Transfer(format!(
            "workbook file '{filename}' has no file extension"
        ))),
    }
}

/// Scan a project listing for the site's default project. Exactly one
/// project may carry the name; a site reporting several violates that
/// invariant and is treated as a malformed listing rather than a miss.
fn default_project_from(projects: &[ProjectSummary]) -> Result<String> {
    let mut matches = projects
        .iter()
        .filter(|p| p.name.eq_ignore_ascii_case("default"));
    match (matches.next(), matches.next()) {
        (Some(project), None) => Ok(project.id.clone()),
        (None, _) => Err(ApiError::NotFound(
            "Project named 'default' was not found on server".into(),
        )),
        (Some(_), Some(_)) => Err(ApiError::MalformedResponse(
            "more than one project named 'default' exists on the site".into(),
        )),
    }
}

/// Read up to `buf.len()` bytes, looping over short reads. Returns the
/// number of bytes filled; 0 means end of file.
fn read_chunk(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn strategy_boundary_at_64_mib() {
        assert!(!needs_chunking(FILESIZE_LIMIT - 1));
        assert!(needs_chunking(FILESIZE_LIMIT));
        assert!(needs_chunking(FILESIZE_LIMIT + 1));
    }

    #[test]
    fn chunk_count_is_ceiling_division() {
        assert_eq!(chunk_count(1), 1);
        assert_eq!(chunk_count(CHUNK_SIZE), 1);
        assert_eq!(chunk_count(CHUNK_SIZE + 1), 2);
        assert_eq!(chunk_count(13 * CHUNK_SIZE), 13);
        assert_eq!(chunk_count(FILESIZE_LIMIT), 13); // 64 MiB / 5 MiB
    }

    #[test]
    fn pages_needed_matches_totals() {
        assert_eq!(pages_needed(0, 100), 0);
        assert_eq!(pages_needed(1, 100), 1);
        assert_eq!(pages_needed(100, 100), 1);
        assert_eq!(pages_needed(101, 100), 2);
        assert_eq!(pages_needed(250, 100), 3);
    }

    #[test]
    fn disposition_filename_extraction() {
        assert_eq!(
            filename_from_disposition(r#"name="tableau_workbook"; filename="report.twbx""#),
            Some("report.twbx".to_string())
        );
        assert_eq!(filename_from_disposition("attachment"), None);
        assert_eq!(filename_from_disposition(r#"filename="""#), None);
        // path traversal in the server-supplied name is rejected
        assert_eq!(
            filename_from_disposition(r#"filename="../../etc/passwd""#),
            None
        );
        assert_eq!(filename_from_disposition(r#"filename="a/b.twbx""#), None);
    }

    #[test]
    fn workbook_filename_splits_at_first_dot() {
        assert_eq!(
            split_workbook_filename("quarterly.twbx").unwrap(),
            ("quarterly", "twbx")
        );
        assert_eq!(
            split_workbook_filename("a.b.twbx").unwrap(),
            ("a", "b.twbx")
        );
        assert!(split_workbook_filename("noextension").is_err());
        assert!(split_workbook_filename(".twbx").is_err());
    }

    #[test]
    fn default_project_found_regardless_of_page_position() {
        // Simulates the accumulated result of a multi-page listing with
        // the default project deep in the set.
        let mut projects: Vec<ProjectSummary> = (0..150)
            .map(|i| ProjectSummary {
                id: format!("p-{i}"),
                name: format!("team-{i}"),
            })
            .collect();
        projects.push(ProjectSummary {
            id: "p-default".into(),
            name: "Default".into(),
        });
        assert_eq!(default_project_from(&projects).unwrap(), "p-default");

        projects[0].name = "default".into(); // now two matches
        assert!(matches!(
            default_project_from(&projects),
            Err(ApiError::MalformedResponse(_))
        ));

        assert!(matches!(
            default_project_from(&[]),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn staged_workbook_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staged.twbx");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"content")
            .unwrap();

        {
            let _staged = StagedWorkbook::new(path.clone());
        }
        assert!(!path.exists());
    }

    #[test]
    fn staged_workbook_remove_is_eager_and_consuming() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staged.twbx");
        std::fs::write(&path, b"content").unwrap();

        let staged = StagedWorkbook::new(path.clone());
        assert_eq!(staged.file_name().unwrap(), "staged.twbx");
        staged.remove().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn read_chunk_fills_and_signals_eof() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, vec![7u8; 10]).unwrap();

        let mut file = File::open(&path).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(read_chunk(&mut file, &mut buf).unwrap(), 4);
        assert_eq!(read_chunk(&mut file, &mut buf).unwrap(), 4);
        assert_eq!(read_chunk(&mut file, &mut buf).unwrap(), 2);
        assert_eq!(read_chunk(&mut file, &mut buf).unwrap(), 0);
    }
}
