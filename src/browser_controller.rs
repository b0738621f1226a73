use headless_chrome::protocol::cdp::Network::CookieParam;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{browser::default_executable, Browser, LaunchOptions};
use reqwest::Url;
use std::fs;
use std::path::Path;
use std::time::Duration;
use sysinfo::{Pid, PidExt, ProcessExt, System, SystemExt};

use crate::{
    config::HarvesterOptions, page::PdfRenderer, types::HarvestError,
    utils::create_random_tmp_folder,
};

/// A running browser able to print a local page.
pub trait PrintSession {
    fn print(&self, page_url: &str) -> Result<Vec<u8>, HarvestError>;
    fn kill(&self) -> bool;
}

pub trait Launcher {
    type Session: PrintSession;
    fn launch(&self) -> Result<Self::Session, HarvestError>;
}

pub struct ChromeLauncher {
    idle_timeout: Duration,
    ignore_certificate_errors: bool,
    user_agent: String,
    base_url: String,
    cookies: Vec<(&'static str, String)>,
}

impl ChromeLauncher {
    pub fn new(options: &HarvesterOptions) -> Self {
        ChromeLauncher {
            idle_timeout: Duration::from_secs(options.browser_timeout_secs),
            ignore_certificate_errors: options.accept_invalid_certs,
            user_agent: options.user_agent.clone(),
            base_url: options.base_url.clone(),
            cookies: options.session_cookies(),
        }
    }
}

impl Launcher for ChromeLauncher {
    type Session = ChromeSession;

    fn launch(&self) -> Result<ChromeSession, HarvestError> {
        let is_docker = std::env::var("IN_DOCKER").is_ok();
        let path = default_executable().map_err(HarvestError::Render)?;
        let options = LaunchOptions::default_builder()
            .path(Some(path))
            .window_size(Some((1920, 1080)))
            .idle_browser_timeout(self.idle_timeout)
            .ignore_certificate_errors(self.ignore_certificate_errors)
            // warning only do this if in docker env
            .sandbox(!is_docker)
            .build()
            .map_err(|e| HarvestError::Render(format!("invalid launch options: {}", e)))?;

        debug!("launching headless browser");
        let browser = Browser::new(options)
            .map_err(|e| HarvestError::Render(format!("browser launching error: {}", e)))?;

        // scoped to the wiki so resources from other hosts never see them
        let cookies = self
            .cookies
            .iter()
            .map(|(name, value)| cookie_param(name, value, &self.base_url))
            .collect();

        Ok(ChromeSession {
            browser,
            user_agent: self.user_agent.clone(),
            cookies,
        })
    }
}

fn cookie_param(name: &str, value: &str, url: &str) -> CookieParam {
    CookieParam {
        name: name.to_string(),
        value: value.to_string(),
        url: Some(url.to_string()),
        domain: None,
        path: None,
        secure: None,
        http_only: None,
        same_site: None,
        expires: None,
        priority: None,
        same_party: None,
        source_scheme: None,
        source_port: None,
        partition_key: None,
    }
}

pub struct ChromeSession {
    browser: Browser,
    user_agent: String,
    cookies: Vec<CookieParam>,
}

impl PrintSession for ChromeSession {
    fn print(&self, page_url: &str) -> Result<Vec<u8>, HarvestError> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| HarvestError::Render(format!("could not create new tab: {}", e)))?;

        let pdf = tab
            .set_user_agent(&self.user_agent, None, None)
            .and_then(|_| {
                if self.cookies.is_empty() {
                    Ok(())
                } else {
                    tab.set_cookies(self.cookies.clone())
                }
            })
            .and_then(|_| tab.navigate_to(page_url))
            .and_then(|t| t.wait_until_navigated())
            .and_then(|t| {
                t.print_to_pdf(Some(PrintToPdfOptions {
                    print_background: Some(true),
                    ..Default::default()
                }))
            })
            .map_err(|e| HarvestError::Render(e.to_string()));

        if let Err(e) = tab.close(false) {
            debug!("could not close tab {}", e);
        }
        pdf
    }

    fn kill(&self) -> bool {
        let pid = match self.browser.get_process_id() {
            Some(pid) => pid,
            None => return false,
        };
        let mut s = System::new();
        s.refresh_processes();
        if let Some(process) = s.process(Pid::from_u32(pid)) {
            debug!("killing process with id {}", pid);
            process.kill();
            return true;
        }
        false
    }
}

/// Prints pages through a browser session that is started on the first
/// render and reused afterwards. A session that stops answering (e.g. after
/// its idle timeout) is killed and relaunched once.
pub struct BrowserController<L: Launcher = ChromeLauncher> {
    launcher: L,
    session: Option<L::Session>,
}

impl BrowserController<ChromeLauncher> {
    pub fn new(options: &HarvesterOptions) -> Self {
        Self::with_launcher(ChromeLauncher::new(options))
    }
}

impl<L: Launcher> BrowserController<L> {
    pub fn with_launcher(launcher: L) -> Self {
        BrowserController {
            launcher,
            session: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    fn session(&mut self) -> Result<&L::Session, HarvestError> {
        if self.session.is_none() {
            self.session = Some(self.launcher.launch()?);
        }
        self.session
            .as_ref()
            .ok_or_else(|| HarvestError::Render("browser not running".into()))
    }

    fn reset(&mut self) {
        if let Some(session) = self.session.take() {
            debug!("killing browser process...");
            session.kill();
        }
    }

    fn print(&mut self, page_url: &str) -> Result<Vec<u8>, HarvestError> {
        match self.session().and_then(|s| s.print(page_url)) {
            Ok(pdf) => Ok(pdf),
            Err(e) => {
                warn!("browser could not print ({}), relaunching", e);
                self.reset();
                self.session()?.print(page_url)
            }
        }
    }
}

impl<L: Launcher> PdfRenderer for BrowserController<L> {
    fn render(&mut self, html: &str, base_url: &str, dest: &Path) -> Result<(), HarvestError> {
        let tmp = create_random_tmp_folder().map_err(|source| HarvestError::Io {
            path: std::env::temp_dir(),
            source,
        })?;
        let page = tmp.join("page.html");
        debug!("printing {} from {:?}", base_url, page);

        let pdf = fs::write(&page, html)
            .map_err(|source| HarvestError::Io {
                path: page.clone(),
                source,
            })
            .and_then(|_| {
                Url::from_file_path(&page)
                    .map_err(|_| HarvestError::Render(format!("not an absolute path {:?}", page)))
            })
            .and_then(|page_url| self.print(page_url.as_str()));

        if let Err(e) = fs::remove_dir_all(&tmp) {
            debug!("could not remove {:?}: {}", tmp, e);
        }

        fs::write(dest, pdf?).map_err(|source| HarvestError::Io {
            path: dest.to_path_buf(),
            source,
        })
    }
}

impl<L: Launcher> Drop for BrowserController<L> {
    fn drop(&mut self) {
        self.reset();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::{
        cell::{Cell, RefCell},
        rc::Rc,
    };

    #[derive(Clone, Default)]
    struct SessionState {
        dead: Rc<Cell<bool>>,
        killed: Rc<Cell<bool>>,
    }

    struct FakeSession(SessionState);

    impl PrintSession for FakeSession {
        fn print(&self, _page_url: &str) -> Result<Vec<u8>, HarvestError> {
            if self.0.dead.get() {
                return Err(HarvestError::Render("transport loop timed out".into()));
            }
            Ok(b"%PDF-1.4 fake".to_vec())
        }

        fn kill(&self) -> bool {
            self.0.killed.set(true);
            true
        }
    }

    #[derive(Clone, Default)]
    struct FakeLauncher {
        sessions: Rc<RefCell<Vec<SessionState>>>,
        refuse: Rc<Cell<bool>>,
    }

    impl Launcher for FakeLauncher {
        type Session = FakeSession;

        fn launch(&self) -> Result<FakeSession, HarvestError> {
            if self.refuse.get() {
                return Err(HarvestError::Render("no chrome".into()));
            }
            let state = SessionState::default();
            self.sessions.borrow_mut().push(state.clone());
            Ok(FakeSession(state))
        }
    }

    #[test]
    fn reuses_a_live_browser() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = FakeLauncher::default();
        let mut controller = BrowserController::with_launcher(launcher.clone());

        controller.render("<p>a</p>", "http://h/a", &dir.path().join("a.pdf")).unwrap();
        controller.render("<p>b</p>", "http://h/b", &dir.path().join("b.pdf")).unwrap();

        assert_eq!(launcher.sessions.borrow().len(), 1);
        assert!(dir.path().join("b.pdf").exists());
    }

    #[test]
    fn relaunches_after_the_browser_went_away() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = FakeLauncher::default();
        let mut controller = BrowserController::with_launcher(launcher.clone());

        controller.render("<p>a</p>", "http://h/a", &dir.path().join("a.pdf")).unwrap();
        let first = launcher.sessions.borrow()[0].clone();
        first.dead.set(true);

        let dest = dir.path().join("b.pdf");
        controller.render("<p>b</p>", "http://h/b", &dest).unwrap();

        assert_eq!(launcher.sessions.borrow().len(), 2);
        assert!(first.killed.get());
        assert_eq!(fs::read(&dest).unwrap(), b"%PDF-1.4 fake");
        assert!(controller.is_running());
    }

    #[test]
    fn failed_launch_is_retried_on_next_render() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = FakeLauncher::default();
        launcher.refuse.set(true);
        let mut controller = BrowserController::with_launcher(launcher.clone());

        let dest = dir.path().join("a.pdf");
        assert!(controller.render("<p>a</p>", "http://h/a", &dest).is_err());
        assert!(!dest.exists());
        assert!(!controller.is_running());

        launcher.refuse.set(false);
        controller.render("<p>a</p>", "http://h/a", &dest).unwrap();
        assert!(dest.exists());
    }

    #[test]
    fn drop_kills_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = FakeLauncher::default();
        {
            let mut controller = BrowserController::with_launcher(launcher.clone());
            controller.render("<p>a</p>", "http://h/a", &dir.path().join("a.pdf")).unwrap();
        }
        assert!(launcher.sessions.borrow()[0].killed.get());
    }

    #[test]
    fn cookies_are_scoped_to_the_wiki() {
        let c = cookie_param("JSESSIONID", "ABC", "http://wiki:8090");
        assert_eq!(c.url.as_deref(), Some("http://wiki:8090"));
        assert!(c.domain.is_none());
    }
}
