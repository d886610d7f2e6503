use crate::presentation::views::{BrandView, HeadView, LayoutChrome, PageMetaView};

const LOGO_SRC: &str = "/static/logo.svg";
const TOOLBAR_SCRIPT_BASE: &str = "//static.cdn.prismic.io/prismic.js";

/// Site-wide values rendered into every document head and header.
#[derive(Debug, Clone)]
pub struct SiteIdentity {
    pub title: String,
    pub description: String,
    pub public_url: String,
    pub lang: String,
    /// CMS repository whose preview toolbar should be injected.
    pub toolbar_repo: Option<String>,
}

#[derive(Clone)]
pub struct ChromeService {
    identity: SiteIdentity,
}

impl ChromeService {
    pub fn new(identity: SiteIdentity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &SiteIdentity {
        &self.identity
    }

    pub fn load(&self) -> LayoutChrome {
        let identity = &self.identity;
        LayoutChrome {
            brand: BrandView {
                title: identity.title.clone(),
                href: "/".to_string(),
                logo_src: LOGO_SRC.to_string(),
            },
            head: HeadView {
                lang: identity.lang.clone(),
                toolbar_script: identity
                    .toolbar_repo
                    .as_deref()
                    .filter(|repo| !repo.trim().is_empty())
                    .map(toolbar_script_src),
            },
            meta: PageMetaView {
                title: identity.title.clone(),
                description: identity.description.clone(),
                canonical: canonical_url(&identity.public_url, "/"),
            },
        }
    }

    /// Chrome for a page at `path`, with canonical link resolved.
    pub fn for_path(&self, path: &str) -> LayoutChrome {
        let canonical = canonical_url(&self.identity.public_url, path);
        self.load().with_canonical(canonical)
    }
}

fn toolbar_script_src(repo: &str) -> String {
    format!("{TOOLBAR_SCRIPT_BASE}?repo={}&new=true", repo.trim())
}

pub fn canonical_url(base: &str, path: &str) -> String {
    let root = normalize_public_site_url(base);
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        root
    } else {
        format!("{root}{trimmed}")
    }
}

fn normalize_public_site_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    format!("{trimmed}/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(toolbar_repo: Option<&str>) -> SiteIdentity {
        SiteIdentity {
            title: "spacetraveling".to_string(),
            description: "Blog".to_string(),
            public_url: "https://blog.example.com".to_string(),
            lang: "pt-BR".to_string(),
            toolbar_repo: toolbar_repo.map(str::to_string),
        }
    }

    #[test]
    fn toolbar_script_only_when_repo_configured() {
        let chrome = ChromeService::new(identity(None)).load();
        assert!(chrome.head.toolbar_script.is_none());

        let chrome = ChromeService::new(identity(Some("spacetraveling"))).load();
        assert_eq!(
            chrome.head.toolbar_script.as_deref(),
            Some("//static.cdn.prismic.io/prismic.js?repo=spacetraveling&new=true")
        );
    }

    #[test]
    fn brand_links_home() {
        let chrome = ChromeService::new(identity(None)).load();
        assert_eq!(chrome.brand.href, "/");
        assert_eq!(chrome.brand.logo_src, "/static/logo.svg");
    }

    #[test]
    fn canonical_joins_without_double_slash() {
        assert_eq!(
            canonical_url("https://blog.example.com/", "/post/a"),
            "https://blog.example.com/post/a"
        );
        assert_eq!(
            canonical_url("https://blog.example.com", "/"),
            "https://blog.example.com/"
        );
    }
}
