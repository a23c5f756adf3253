//! Existence checks for links the route table cannot vouch for.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use reqwest::blocking::Client;
use url::Url;

use super::path::{join, normalize_path};
use crate::error::Result;

/// Where links outside the route table are looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackBase {
    /// A local copy of the published site.
    Path(PathBuf),
    /// The published site itself, probed with `HEAD` requests.
    Url(Url),
}

impl FromStr for FallbackBase {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match Url::parse(s) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(FallbackBase::Url(url)),
            _ => Ok(FallbackBase::Path(PathBuf::from(s))),
        }
    }
}

impl fmt::Display for FallbackBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackBase::Path(path) => write!(f, "{}", path.display()),
            FallbackBase::Url(url) => write!(f, "{url}"),
        }
    }
}

/// Result of checking a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    Exists,
    /// Nothing was found at `checked`, the last location tried.
    Missing { checked: String },
    /// No fallback is configured, so the link cannot be checked at all.
    Unverifiable,
}

impl LinkStatus {
    pub fn exists(&self) -> bool {
        matches!(self, LinkStatus::Exists)
    }
}

/// Checks links against the output tree and an optional fallback site.
#[derive(Debug, Clone)]
pub struct LinkChecker {
    root: PathBuf,
    fallback: Option<FallbackBase>,
    client: Option<Client>,
}

impl LinkChecker {
    /// A checker rooted at `root`, the directory routed paths are relative to.
    ///
    /// An HTTP client is only built when the fallback is a URL.
    pub fn new(
        root: impl Into<PathBuf>,
        fallback: Option<FallbackBase>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let client = match &fallback {
            Some(FallbackBase::Url(_)) => {
                let mut builder = Client::builder();
                if let Some(timeout) = timeout {
                    builder = builder.timeout(timeout);
                }
                Some(builder.build()?)
            }
            _ => None,
        };

        Ok(Self {
            root: root.into(),
            fallback,
            client,
        })
    }

    /// A checker that only looks at the local filesystem.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            fallback: None,
            client: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fallback(&self) -> Option<&FallbackBase> {
        self.fallback.as_ref()
    }

    /// Check a relative link that the route table does not know about.
    ///
    /// The link is first looked up next to the routed current document under
    /// the root; failing that, the fallback is asked for the same path.
    pub fn check_relative(&self, routed_dir: &str, link_path: &str) -> LinkStatus {
        let target = normalize_path(&join(routed_dir, link_path));
        let local = self.root.join(&target);
        log::debug!("Checking link: {}", local.display());
        if local.exists() {
            return LinkStatus::Exists;
        }

        match self.check_fallback(&target) {
            LinkStatus::Unverifiable => LinkStatus::Missing {
                checked: local.display().to_string(),
            },
            status => status,
        }
    }

    /// Check a site-absolute path (or any path) against the fallback.
    pub fn check_fallback(&self, link_path: &str) -> LinkStatus {
        let link_path = link_path.split('#').next().unwrap_or_default();

        match &self.fallback {
            None => LinkStatus::Unverifiable,
            Some(FallbackBase::Path(base)) => {
                let candidate = normalize_path(&format!("{}/{}", base.display(), link_path));
                log::debug!("Checking link: {candidate}");
                if Path::new(&candidate).exists() {
                    LinkStatus::Exists
                } else {
                    LinkStatus::Missing { checked: candidate }
                }
            }
            Some(FallbackBase::Url(base)) => {
                let Ok(url) = base.join(link_path) else {
                    return LinkStatus::Missing {
                        checked: format!("{base}{link_path}"),
                    };
                };
                log::debug!("Checking link: {url}");
                if self.probe(&url) {
                    LinkStatus::Exists
                } else {
                    LinkStatus::Missing {
                        checked: url.to_string(),
                    }
                }
            }
        }
    }

    /// `HEAD` the URL, following redirects. Transport errors count as missing.
    fn probe(&self, url: &Url) -> bool {
        let Some(client) = &self.client else {
            return false;
        };
        match client.head(url.as_str()).send() {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                log::debug!("HEAD {url} failed: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_base_from_str() {
        assert!(matches!(
            "https://www.example.org/".parse::<FallbackBase>().unwrap(),
            FallbackBase::Url(_)
        ));
        assert_eq!(
            "site/public".parse::<FallbackBase>().unwrap(),
            FallbackBase::Path(PathBuf::from("site/public"))
        );
        assert_eq!(
            "/srv/www".parse::<FallbackBase>().unwrap(),
            FallbackBase::Path(PathBuf::from("/srv/www"))
        );
    }

    #[test]
    fn test_check_relative_local_hit() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("img")).unwrap();
        std::fs::write(dir.path().join("img/cover.png"), b"png").unwrap();

        let checker = LinkChecker::local(dir.path());
        assert_eq!(checker.check_relative("", "img/cover.png"), LinkStatus::Exists);
        assert!(matches!(
            checker.check_relative("", "img/missing.png"),
            LinkStatus::Missing { .. }
        ));
    }

    #[test]
    fn test_check_fallback_path() {
        let site = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(site.path().join("suttas/AN")).unwrap();
        std::fs::write(site.path().join("suttas/AN/AN1_1.html"), b"").unwrap();

        let checker = LinkChecker::new(
            "out",
            Some(FallbackBase::Path(site.path().to_path_buf())),
            None,
        )
        .unwrap();

        assert!(checker.check_fallback("/suttas/AN/AN1_1.html#x").exists());
        match checker.check_fallback("/suttas/AN/AN9_9.html") {
            LinkStatus::Missing { checked } => assert!(checked.ends_with("suttas/AN/AN9_9.html")),
            other => panic!("expected missing, got {other:?}"),
        }
    }

    /// Serve `HEAD` requests on a local port: `*ok.html` exists, `*moved.html`
    /// redirects to `/ok.html`, everything else is a 404.
    fn serve() -> Url {
        use std::io::{BufRead, BufReader, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request = String::new();
                reader.read_line(&mut request).unwrap();
                let mut header = String::new();
                while reader.read_line(&mut header).unwrap() > 2 {
                    header.clear();
                }

                let path = request.split_whitespace().nth(1).unwrap_or_default();
                let status = if path.ends_with("ok.html") {
                    "200 OK\r\n"
                } else if path.ends_with("moved.html") {
                    "301 Moved Permanently\r\nLocation: /ok.html\r\n"
                } else {
                    "404 Not Found\r\n"
                };
                let _ = write!(
                    stream,
                    "HTTP/1.1 {status}Content-Length: 0\r\nConnection: close\r\n\r\n"
                );
            }
        });

        Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap()
    }

    fn url_checker(root: &Path, base: Url) -> LinkChecker {
        let client = Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        LinkChecker {
            root: root.to_path_buf(),
            fallback: Some(FallbackBase::Url(base)),
            client: Some(client),
        }
    }

    #[test]
    fn test_check_fallback_url() {
        let base = serve();
        let checker = url_checker(Path::new("out"), base.clone());

        assert_eq!(checker.check_fallback("/ok.html#top"), LinkStatus::Exists);
        assert_eq!(checker.check_fallback("/moved.html"), LinkStatus::Exists);
        assert_eq!(
            checker.check_fallback("/gone.html"),
            LinkStatus::Missing {
                checked: format!("{base}gone.html")
            }
        );
    }

    #[test]
    fn test_check_relative_falls_back_to_url() {
        let dir = tempfile::tempdir().unwrap();
        let base = serve();
        let checker = url_checker(dir.path(), base.clone());

        assert_eq!(checker.check_relative("suttas", "ok.html"), LinkStatus::Exists);
        assert_eq!(
            checker.check_relative("suttas", "../gone.html"),
            LinkStatus::Missing {
                checked: format!("{base}gone.html")
            }
        );
    }

    #[test]
    fn test_url_fallback_builds_client() {
        let checker = LinkChecker::new(
            "out",
            Some(FallbackBase::Url(Url::parse("http://127.0.0.1:1/").unwrap())),
            Some(Duration::from_secs(1)),
        )
        .unwrap();
        assert!(checker.client.is_some());
        assert!(LinkChecker::local("out").client.is_none());
    }

    #[test]
    fn test_without_fallback_is_unverifiable() {
        let checker = LinkChecker::local(".");
        assert_eq!(checker.check_fallback("/x.html"), LinkStatus::Unverifiable);
    }
}
