//! Resolve user input (a kalshi.com URL or a bare event ticker) into what to fetch.

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

lazy_static! {
    static ref NON_SLUG: Regex = Regex::new(r"[^a-z0-9]+").expect("slug regex is valid");
}

const MAX_SLUG_LEN: usize = 60;

/// URL slugs whose API category name differs from the slug itself.
const SLUG_TO_CATEGORY: &[(&str, &str)] = &[
    ("climate", "Climate and Weather"),
    ("science", "Science and Technology"),
    ("culture", "Entertainment"),
    ("mentions", "Social"),
    ("companies", "Financials"),
    ("all-sports", "Sports"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Site root or anything we can't classify. Lists all open events.
    Home { page_url: Option<Url> },
    /// `/category/<slug>` or `/sports/<slug>`.
    Category { slug: String, page_url: Option<Url> },
    /// `/markets/...` URL or a bare event ticker.
    Market {
        event_ticker: String,
        page_url: Option<Url>,
    },
}

impl Target {
    /// Classify a URL or bare ticker. Never fails: unknown shapes become `Home`.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();

        if !trimmed.contains('/') && !trimmed.contains('.') {
            if trimmed.is_empty() {
                return Self::Home { page_url: None };
            }
            return Self::Market {
                event_ticker: trimmed.to_uppercase(),
                page_url: None,
            };
        }

        let Some(url) = parse_lenient(trimmed) else {
            return Self::Home { page_url: None };
        };

        let segments: Vec<String> = url
            .path_segments()
            .map(|parts| parts.filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();

        match segments.as_slice() {
            [section, slug, ..] if section == "category" || section == "sports" => {
                Self::Category {
                    slug: slug.clone(),
                    page_url: Some(url),
                }
            }
            // The event ticker is the last segment of /markets/<series>/<slug>/<event>,
            // or the second one of /markets/<event>.
            [section, .., last] if section == "markets" => Self::Market {
                event_ticker: last.to_uppercase(),
                page_url: Some(url),
            },
            _ => Self::Home {
                page_url: Some(url),
            },
        }
    }

    pub fn event_ticker(&self) -> Option<&str> {
        match self {
            Self::Market { event_ticker, .. } => Some(event_ticker),
            _ => None,
        }
    }

    pub fn category_slug(&self) -> Option<&str> {
        match self {
            Self::Category { slug, .. } => Some(slug),
            _ => None,
        }
    }

    /// The web page to render for this target, derived from `web_base` when the
    /// input was not already a URL.
    pub fn page_url(&self, web_base: &Url) -> Url {
        match self {
            Self::Home { page_url: Some(url) }
            | Self::Category {
                page_url: Some(url),
                ..
            }
            | Self::Market {
                page_url: Some(url),
                ..
            } => url.clone(),
            Self::Home { page_url: None } => join_path(web_base, "browse"),
            Self::Category { slug, .. } => join_path(web_base, &format!("category/{slug}")),
            Self::Market { event_ticker, .. } => {
                let ticker = event_ticker.to_lowercase();
                let series = ticker.split('-').next().unwrap_or(&ticker).to_string();
                join_path(web_base, &format!("markets/{series}/{ticker}"))
            }
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Home { page_url: Some(url) }
            | Self::Category {
                page_url: Some(url),
                ..
            }
            | Self::Market {
                page_url: Some(url),
                ..
            } => write!(f, "{url}"),
            Self::Home { page_url: None } => write!(f, "home"),
            Self::Category { slug, .. } => write!(f, "category {slug}"),
            Self::Market { event_ticker, .. } => write!(f, "{event_ticker}"),
        }
    }
}

fn parse_lenient(input: &str) -> Option<Url> {
    Url::parse(input)
        .ok()
        .filter(|url| url.has_host())
        .or_else(|| Url::parse(&format!("https://{input}")).ok())
}

fn join_path(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let prefix = base.path().trim_end_matches('/');
    url.set_path(&format!("{prefix}/{path}"));
    url
}

/// API category name for a URL category slug.
pub fn category_name(slug: &str) -> String {
    let lower = slug.to_lowercase();
    SLUG_TO_CATEGORY
        .iter()
        .find(|(s, _)| *s == lower)
        .map(|(_, name)| name.to_string())
        .unwrap_or(lower)
}

/// URL-friendly slug of a market title, as kalshi.com builds its market paths.
pub fn slugify(title: &str) -> String {
    let lower = title.to_lowercase();
    let slug = NON_SLUG.replace_all(&lower, "-");
    let slug = slug.trim_matches('-');
    slug.chars().take(MAX_SLUG_LEN).collect()
}

/// Web URL of an event: `<web>/markets/<series>/<slug>/<ticker>`.
pub fn event_page_url(web_base: &Url, series_ticker: &str, title: &str, event_ticker: &str) -> Url {
    join_path(
        web_base,
        &format!(
            "markets/{}/{}/{}",
            series_ticker.to_lowercase(),
            slugify(title),
            event_ticker.to_lowercase()
        ),
    )
}
