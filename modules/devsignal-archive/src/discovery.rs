// Candidate URL discovery: pull links out of profile fields, judge whether
// each looks like a personal site worth crawling, and rank by where it came from.

use std::collections::HashSet;
use std::sync::LazyLock;

use devsignal_common::{CandidateUrl, PrimaryProfile, UrlOrigin, Verdict};
use regex::Regex;

/// Absolute URLs, `www.` forms, and bare `host.tld/path` forms.
static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\b(?:https?://[^\s<>"'()]+|www\.[^\s<>"'()]+|[a-z0-9][a-z0-9-]*(?:\.[a-z0-9-]+)*\.[a-z]{2,}(?:/[^\s<>"'()]*)?)"#,
    )
    .expect("valid regex")
});

/// `linkedin.com/in/<handle>` with or without scheme and subdomain.
static LINKEDIN_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:https?://)?(?:[a-z]{2,3}\.)?linkedin\.com/in/([A-Za-z0-9_%-]{2,100})")
        .expect("valid regex")
});

/// The short `in/<handle>` form people paste into bios.
static LINKEDIN_SHORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[\s(\[,;])in/([A-Za-z0-9_-]{2,100})\b").expect("valid regex")
});

static HANDLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{2,100}$").expect("valid regex"));

/// The primary platform. Links back to it are never personal sites.
const PRIMARY_DOMAIN: &str = "github.com";

/// Hosts that are never someone's personal site. Subdomains match too.
const EXCLUDED_DOMAINS: &[&str] = &[
    // code challenges
    "codewars.com",
    "leetcode.com",
    "hackerrank.com",
    "exercism.org",
    "exercism.io",
    "codechef.com",
    "codeforces.com",
    "topcoder.com",
    "hackerearth.com",
    "kaggle.com",
    "freecodecamp.org",
    "codepen.io",
    "codesandbox.io",
    "replit.com",
    // social
    "linkedin.com",
    "twitter.com",
    "x.com",
    "facebook.com",
    "instagram.com",
    "youtube.com",
    "youtu.be",
    "tiktok.com",
    "reddit.com",
    "mastodon.social",
    "bsky.app",
    "threads.net",
    "discord.gg",
    "discord.com",
    "slack.com",
    "t.me",
    "stackoverflow.com",
    "stackexchange.com",
    "medium.com",
    "dev.to",
    "hashnode.com",
    // registries
    "npmjs.com",
    "pypi.org",
    "crates.io",
    "rubygems.org",
    "nuget.org",
    "pkg.go.dev",
    "docker.com",
    // code hosts
    "gitlab.com",
    "bitbucket.org",
    "sourceforge.net",
    "githubusercontent.com",
    // big vendors and shorteners
    "google.com",
    "amazon.com",
    "microsoft.com",
    "apple.com",
    "bit.ly",
    "goo.gl",
];

/// TLDs we accept as plausibly a personal site. Anything else is unverified,
/// which keeps `README.md` and `main.rs` in descriptions from being crawled.
const PLAUSIBLE_TLDS: &[&str] = &[
    "com", "org", "net", "io", "dev", "me", "tech", "co", "app", "page", "site", "xyz", "blog",
    "info", "ai", "sh", "codes", "design", "studio", "website", "online", "space", "cloud", "pro",
    "one", "is", "uk", "de", "fr", "ca", "nl", "eu", "au", "ch", "se", "no", "es", "it", "jp",
    "personal", "portfolio",
];

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', ')', ']', '!', '?', '\'', '"'];

/// Pull URL-looking substrings out of free text, in order of appearance.
pub fn extract_urls(text: &str) -> Vec<String> {
    URL_RE
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(TRAILING_PUNCTUATION).to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Make a raw link absolute: trim, strip trailing punctuation, prepend `https://`
/// when there is no scheme. `None` for empty input.
pub fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches(TRAILING_PUNCTUATION);
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains("://") || has_non_http_scheme(trimmed) {
        Some(trimmed.to_string())
    } else {
        Some(format!("https://{trimmed}"))
    }
}

/// `mailto:x`, `ftp:x`: a scheme without `//`.
fn has_non_http_scheme(s: &str) -> bool {
    match s.split_once(':') {
        Some((scheme, rest)) => {
            !scheme.is_empty()
                && scheme.chars().all(|c| c.is_ascii_alphabetic())
                && !rest.starts_with(|c: char| c.is_ascii_digit())
                && !scheme.contains('.')
        }
        None => false,
    }
}

/// Judge one normalized URL.
pub fn classify(url: &str) -> (Verdict, Option<String>) {
    let parsed = match url::Url::parse(url) {
        Ok(u) => u,
        Err(e) => return (Verdict::Unverified, Some(format!("unparsable: {e}"))),
    };
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return (
            Verdict::Unverified,
            Some(format!("unsupported scheme: {}", parsed.scheme())),
        );
    }
    let host = match parsed.host() {
        Some(url::Host::Domain(host)) => host.trim_end_matches('.').to_ascii_lowercase(),
        Some(_) => return (Verdict::Unverified, Some("IP address host".to_string())),
        None => return (Verdict::Unverified, Some("no host".to_string())),
    };
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();

    if domain_matches(&host, PRIMARY_DOMAIN) {
        return (
            Verdict::PlatformExcluded,
            Some(format!("primary platform domain: {PRIMARY_DOMAIN}")),
        );
    }
    if let Some(domain) = EXCLUDED_DOMAINS.iter().find(|d| domain_matches(&host, d)) {
        return (
            Verdict::PlatformExcluded,
            Some(format!("excluded platform: {domain}")),
        );
    }

    let tld = host.rsplit('.').next().unwrap_or_default();
    if !host.contains('.') || !PLAUSIBLE_TLDS.contains(&tld) {
        return (Verdict::Unverified, Some(format!("implausible TLD: {tld}")));
    }

    (Verdict::Personal, None)
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{domain}"))
}

fn candidate(raw: &str, origin: UrlOrigin) -> Option<CandidateUrl> {
    let url = normalize_url(raw)?;
    let (verdict, reason) = classify(&url);
    Some(CandidateUrl {
        raw: raw.trim().to_string(),
        url,
        origin,
        verdict,
        reason,
    })
}

/// Every candidate URL from the profile, ranked by origin and deduplicated on
/// the normalized URL. Rejected candidates are kept with their verdict.
pub fn discover_candidates(profile: &PrimaryProfile, manual: &[String]) -> Vec<CandidateUrl> {
    let mut found = Vec::new();

    for raw in manual {
        found.extend(candidate(raw, UrlOrigin::ManualOverride));
    }
    if let Some(blog) = profile.blog.as_deref() {
        found.extend(candidate(blog, UrlOrigin::DeclaredLink));
    }
    if let Some(bio) = profile.bio.as_deref() {
        for raw in extract_urls(bio) {
            found.extend(candidate(&raw, UrlOrigin::Bio));
        }
    }
    for repo in &profile.repositories {
        if let Some(homepage) = repo.homepage.as_deref() {
            found.extend(candidate(homepage, UrlOrigin::RepositoryHomepage));
        }
        if let Some(description) = repo.description.as_deref() {
            for raw in extract_urls(description) {
                found.extend(candidate(&raw, UrlOrigin::RepositoryDescription));
            }
        }
        if repo.has_pages && !profile.login.is_empty() {
            let host = format!("{}.github.io", profile.login.to_ascii_lowercase());
            // The `<login>.github.io` repo is served at the domain root.
            let pages = if repo.name.eq_ignore_ascii_case(&host) {
                format!("https://{host}")
            } else {
                format!("https://{host}/{}", repo.name)
            };
            found.extend(candidate(&pages, UrlOrigin::RepositoryPages));
        }
    }

    // Stable: within one origin, keep order of appearance.
    found.sort_by_key(|c| c.origin);

    let mut seen = HashSet::new();
    found.retain(|c| seen.insert(dedup_key(&c.url)));
    found
}

fn dedup_key(url: &str) -> String {
    url.trim_end_matches('/').to_ascii_lowercase()
}

/// The first `max` crawlable candidates, in rank order.
pub fn crawl_targets(candidates: &[CandidateUrl], max: usize) -> Vec<CandidateUrl> {
    candidates
        .iter()
        .filter(|c| c.is_crawlable())
        .take(max)
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Professional-network references
// ---------------------------------------------------------------------------

/// Canonical `https://linkedin.com/in/<handle>` for a full URL, `linkedin.com/in/x`,
/// `in/x`, or a bare handle. `None` when nothing handle-shaped is found.
pub fn normalize_professional_reference(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches(TRAILING_PUNCTUATION);
    let handle = if let Some(caps) = LINKEDIN_URL_RE.captures(trimmed) {
        caps.get(1)?.as_str().to_string()
    } else if let Some(rest) = trimmed.strip_prefix("in/") {
        rest.split(['/', '?', '#']).next()?.to_string()
    } else if HANDLE_RE.is_match(trimmed) {
        trimmed.to_string()
    } else {
        return None;
    };

    let handle = handle.trim_end_matches('/');
    if !HANDLE_RE.is_match(handle) && !handle.contains('%') {
        return None;
    }
    Some(format!("https://linkedin.com/in/{handle}"))
}

/// Professional-network profile references found in the profile, canonicalized,
/// deduplicated, in rank order (declared link, bio, repositories).
pub fn discover_professional_references(profile: &PrimaryProfile) -> Vec<String> {
    let mut texts: Vec<&str> = Vec::new();
    texts.extend(profile.blog.as_deref());
    texts.extend(profile.bio.as_deref());
    for repo in &profile.repositories {
        texts.extend(repo.homepage.as_deref());
        texts.extend(repo.description.as_deref());
    }

    let mut seen = HashSet::new();
    let mut refs = Vec::new();
    for text in texts {
        let full = LINKEDIN_URL_RE.find_iter(text).map(|m| m.as_str());
        let short = LINKEDIN_SHORT_RE
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| &text[m.start().saturating_sub(3)..m.end()]);
        for raw in full.chain(short) {
            if let Some(canonical) = normalize_professional_reference(raw) {
                if seen.insert(canonical.to_ascii_lowercase()) {
                    refs.push(canonical);
                }
            }
        }
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use devsignal_common::RepositoryRecord;

    fn profile() -> PrimaryProfile {
        PrimaryProfile {
            login: "octocat".to_string(),
            ..Default::default()
        }
    }

    // --- extraction ---

    #[test]
    fn extracts_absolute_www_and_bare_forms() {
        let urls = extract_urls("Site: https://ada.dev/, also www.ada.blog and ada.io/talks.");
        assert_eq!(urls, vec!["https://ada.dev/", "www.ada.blog", "ada.io/talks"]);
    }

    #[test]
    fn strips_trailing_punctuation() {
        assert_eq!(normalize_url("ada.dev).").as_deref(), Some("https://ada.dev"));
        assert_eq!(
            normalize_url("https://ada.dev/talks;").as_deref(),
            Some("https://ada.dev/talks")
        );
    }

    #[test]
    fn scheme_less_gets_https() {
        assert_eq!(
            normalize_url("www.ada.dev").as_deref(),
            Some("https://www.ada.dev")
        );
        assert_eq!(normalize_url("  ").as_deref(), None);
    }

    // --- validation ---

    #[test]
    fn exclusion_list_is_rejected() {
        for url in [
            "https://codewars.com/users/ada",
            "https://www.leetcode.com/ada",
            "https://github.com/ada",
            "https://gist.github.com/ada",
            "https://ada.medium.com",
        ] {
            assert_eq!(classify(url).0, Verdict::PlatformExcluded, "{url}");
        }
    }

    #[test]
    fn personal_domains_are_accepted() {
        for url in [
            "https://ada.dev",
            "https://blog.ada-lovelace.com/posts",
            "https://ada.github.io",
            "https://ada.netlify.app",
        ] {
            assert_eq!(classify(url).0, Verdict::Personal, "{url}");
        }
    }

    #[test]
    fn odd_schemes_and_tlds_are_unverified() {
        assert_eq!(classify("ftp://ada.dev").0, Verdict::Unverified);
        assert_eq!(classify("mailto:ada@ada.dev").0, Verdict::Unverified);
        assert_eq!(classify("https://README.md").0, Verdict::Unverified);
        assert_eq!(classify("https://localhost").0, Verdict::Unverified);
        assert_eq!(classify("https://10.0.0.1").0, Verdict::Unverified);
    }

    // --- ranking ---

    #[test]
    fn candidates_rank_by_origin_and_dedup() {
        let mut p = profile();
        p.bio = Some("Writing at https://ada.dev and codewars.com".to_string());
        p.blog = Some("ada.blog".to_string());
        p.repositories = vec![
            RepositoryRecord {
                name: "site".to_string(),
                homepage: Some("https://ada.dev/".to_string()),
                has_pages: true,
                ..Default::default()
            },
        ];

        let candidates = discover_candidates(&p, &[]);
        let urls: Vec<_> = candidates.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://ada.blog",
                "https://ada.dev",
                "https://codewars.com",
                "https://octocat.github.io/site",
            ]
        );
        assert_eq!(candidates[0].origin, UrlOrigin::DeclaredLink);
        assert_eq!(candidates[2].verdict, Verdict::PlatformExcluded);

        let targets = crawl_targets(&candidates, 2);
        assert_eq!(targets.len(), 2);
        assert!(targets.iter().all(|c| c.is_crawlable()));
    }

    #[test]
    fn user_pages_repo_maps_to_domain_root() {
        let mut p = profile();
        p.repositories = vec![
            RepositoryRecord {
                name: "Octocat.github.io".to_string(),
                has_pages: true,
                ..Default::default()
            },
            RepositoryRecord {
                name: "notes".to_string(),
                has_pages: true,
                ..Default::default()
            },
        ];

        let urls: Vec<_> = discover_candidates(&p, &[])
            .into_iter()
            .map(|c| c.url)
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://octocat.github.io".to_string(),
                "https://octocat.github.io/notes".to_string(),
            ]
        );
    }

    #[test]
    fn manual_override_outranks_discovery() {
        let mut p = profile();
        p.blog = Some("https://ada.blog".to_string());
        let candidates = discover_candidates(&p, &["ada.dev".to_string()]);
        assert_eq!(candidates[0].origin, UrlOrigin::ManualOverride);
        assert_eq!(candidates[0].url, "https://ada.dev");
    }

    #[test]
    fn only_excluded_bio_link_yields_no_targets() {
        let mut p = profile();
        p.bio = Some("Kata addict: codewars.com".to_string());
        let candidates = discover_candidates(&p, &[]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].verdict, Verdict::PlatformExcluded);
        assert!(crawl_targets(&candidates, 3).is_empty());
    }

    // --- professional references ---

    #[test]
    fn professional_reference_forms_normalize() {
        let canonical = Some("https://linkedin.com/in/ada-lovelace".to_string());
        assert_eq!(
            normalize_professional_reference("https://www.linkedin.com/in/ada-lovelace/"),
            canonical
        );
        assert_eq!(
            normalize_professional_reference("linkedin.com/in/ada-lovelace"),
            canonical
        );
        assert_eq!(normalize_professional_reference("in/ada-lovelace"), canonical);
        assert_eq!(normalize_professional_reference("ada-lovelace"), canonical);
        assert_eq!(normalize_professional_reference("not a handle!"), None);
    }

    #[test]
    fn professional_references_found_in_bio() {
        let mut p = profile();
        p.bio = Some("Hire me: in/ada-lovelace, or linkedin.com/in/ada-lovelace".to_string());
        p.blog = Some("https://uk.linkedin.com/in/ada".to_string());
        let refs = discover_professional_references(&p);
        assert_eq!(
            refs,
            vec![
                "https://linkedin.com/in/ada",
                "https://linkedin.com/in/ada-lovelace",
            ]
        );
    }
}
