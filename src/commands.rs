// Migration scenarios. Each is a fixed, linear sequence of steps; the
// first failing step aborts the rest, but sign-out of every session that
// was opened is still attempted (best-effort) without masking the
// scenario's own result.

use tracing::{info, warn};

use crate::api::ApiClient;
use crate::cli::{resolve_password, MoveToProjectArgs, MoveToServerArgs, MoveToSiteArgs};
use crate::error::{ApiError, Result};
use crate::session::{Session, SessionMgr};
use crate::workbook::WorkbookMgr;

/// Move a workbook into another project on the same site. Pure metadata
/// update; no file transfer.
pub fn move_to_project(args: &MoveToProjectArgs) -> Result<()> {
    let password = resolve_password(args.common.password.as_deref(), "Password")?;
    info!(
        "Moving workbook '{}' to project '{}' as {}",
        args.common.workbook_name, args.dest_project, args.common.username
    );

    info!("1. Signing in as {}", args.common.username);
    let client = ApiClient::new(&args.common.server, args.common.request_timeout())?;
    let session_mgr = SessionMgr::new(&client, &args.common.username, &password, "");
    let session = session_mgr.sign_in()?;

    let result = move_within_site(
        &client,
        &session,
        &args.common.workbook_name,
        &args.dest_project,
    );

    info!("5. Signing out and invalidating the authentication token");
    sign_out_best_effort(&session_mgr, &session);
    result
}

fn move_within_site(
    client: &ApiClient,
    session: &Session,
    workbook_name: &str,
    dest_project: &str,
) -> Result<()> {
    let mgr = WorkbookMgr::new(client, session);

    info!("2. Finding project id of '{dest_project}'");
    let dest_project_id = mgr.find_project_by_name(dest_project)?;

    info!("3. Finding workbook id of '{workbook_name}'");
    let (source_project_id, workbook_id) =
        mgr.find_workbook_by_name(session.user_id(), workbook_name)?;
    ensure_distinct_projects(&source_project_id, &dest_project_id)?;

    info!("4. Moving workbook to '{dest_project}'");
    mgr.move_workbook(&workbook_id, &dest_project_id)
}

/// Move a workbook to the 'default' project on a different server.
pub fn move_to_server(args: &MoveToServerArgs) -> Result<()> {
    let password = resolve_password(args.common.password.as_deref(), "Password")?;
    let dest_password =
        resolve_password(args.dest_password.as_deref(), "Destination password")?;
    info!(
        "Moving workbook '{}' to the 'default' project on {}",
        args.common.workbook_name, args.dest_server
    );

    info!("1. Signing in to both servers to obtain authentication tokens");
    let source_client = ApiClient::new(&args.common.server, args.common.request_timeout())?;
    let dest_client = ApiClient::new(&args.dest_server, args.common.request_timeout())?;
    let source_mgr = SessionMgr::new(&source_client, &args.common.username, &password, "");
    let dest_mgr = SessionMgr::new(
        &dest_client,
        &args.dest_username,
        &dest_password,
        &args.dest_site_id,
    );

    run_transfer(
        &source_client,
        &source_mgr,
        &dest_client,
        &dest_mgr,
        &args.common.workbook_name,
    )
}

/// Move a workbook from the default site to another site of the same
/// server, signing in twice with the same credentials.
pub fn move_to_site(args: &MoveToSiteArgs) -> Result<()> {
    let password = resolve_password(args.common.password.as_deref(), "Password")?;
    info!(
        "Moving workbook '{}' to the 'default' project on site '{}'",
        args.common.workbook_name, args.dest_site
    );

    info!("1. Signing in to both sites to obtain authentication tokens");
    let client = ApiClient::new(&args.common.server, args.common.request_timeout())?;
    let source_mgr = SessionMgr::new(&client, &args.common.username, &password, "");
    let dest_mgr = SessionMgr::new(&client, &args.common.username, &password, &args.dest_site);

    run_transfer(
        &client,
        &source_mgr,
        &client,
        &dest_mgr,
        &args.common.workbook_name,
    )
}

/// Shared download→publish→delete sequence for the cross-server and
/// cross-site scenarios. Opens both sessions, runs the transfer, then
/// signs out whichever sessions were opened.
fn run_transfer(
    source_client: &ApiClient,
    source_mgr: &SessionMgr,
    dest_client: &ApiClient,
    dest_mgr: &SessionMgr,
    workbook_name: &str,
) -> Result<()> {
    let source_session = source_mgr.sign_in()?;
    let dest_session = match dest_mgr.sign_in() {
        Ok(session) => session,
        Err(err) => {
            sign_out_best_effort(source_mgr, &source_session);
            return Err(err);
        }
    };

    let result = transfer_workbook(
        source_client,
        &source_session,
        dest_client,
        &dest_session,
        workbook_name,
    );

    info!("7. Signing out and invalidating both authentication tokens");
    sign_out_best_effort(source_mgr, &source_session);
    sign_out_best_effort(dest_mgr, &dest_session);
    result
}

fn transfer_workbook(
    source_client: &ApiClient,
    source_session: &Session,
    dest_client: &ApiClient,
    dest_session: &Session,
    workbook_name: &str,
) -> Result<()> {
    let source = WorkbookMgr::new(source_client, source_session);
    let dest = WorkbookMgr::new(dest_client, dest_session);

    info!("2. Finding workbook id of '{workbook_name}'");
    let (_, workbook_id) = source.find_workbook_by_name(source_session.user_id(), workbook_name)?;

    info!("3. Finding the 'default' project id on the destination");
    let dest_project_id = dest.find_default_project_id()?;

    info!("4. Downloading the workbook to move");
    let staged = source.download(&workbook_id)?;

    info!("5. Publishing the workbook to the destination");
    dest.publish(&staged, &dest_project_id)?;

    info!("6. Deleting the workbook from the source and removing the staging file");
    source.delete_workbook(&workbook_id, staged)
}

/// A move is refused outright when the workbook already sits in the
/// destination project, before anything is written.
fn ensure_distinct_projects(source_project_id: &str, dest_project_id: &str) -> Result<()> {
    if source_project_id == dest_project_id {
        return Err(ApiError::NoOp(
            "Workbook already in destination project".into(),
        ));
    }
    Ok(())
}

/// Sign-out runs during cleanup on both success and failure paths; a
/// failure here is logged and swallowed so it never replaces the
/// scenario's own outcome.
fn sign_out_best_effort(mgr: &SessionMgr, session: &Session) {
    if let Err(err) = mgr.sign_out(session) {
        warn!("sign-out failed during cleanup (ignored): {err}");
    }
}
