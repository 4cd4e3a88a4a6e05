// Best-effort structure from a personal site's markdown: heading sections,
// a technology keyword scan, and a coarse site type.

use std::collections::HashSet;
use std::sync::LazyLock;

use devsignal_common::{SiteExtract, SiteType};
use regex::Regex;

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{0,3}(#{1,6})\s+(.+?)\s*#*\s*$").expect("valid regex"));

static LIST_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*+•]|\d+[.)])\s+(.+)$").expect("valid regex"));

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").expect("valid regex"));

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)*\.([A-Za-z]{2,})")
        .expect("valid regex")
});

/// `logo@2x.png` is an asset name, not an address.
const ASSET_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp", "avif"];

static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i:based in|located in|living in|location:)\s*([^.;|!\n]{2,60})")
        .expect("valid regex")
});

/// Entries kept per section.
const MAX_ITEMS: usize = 25;
/// Longer first lines are prose, not a headline.
const MAX_HEADLINE_LEN: usize = 160;

const TECH_KEYWORDS: &[&str] = &[
    "python", "javascript", "typescript", "react", "vue", "angular", "node", "java", "kotlin",
    "swift", "golang", "rust", "c++", "c#", "docker", "kubernetes", "aws", "azure", "gcp",
    "terraform", "mongodb", "postgresql", "mysql", "redis", "machine learning", "ai",
    "data science", "blockchain", "css", "html", "scss", "sass", "bootstrap", "figma", "sketch",
    "photoshop", "git", "firebase", "ionic", "jquery", "sql", "jest", "storybook", "webpack",
    "babel", "eslint", "next.js", "nextjs", "express", "tailwind", "tailwindcss", "websockets",
    "socket.io", "solana", "graphql", "apollo", "redux", "mobx", "gatsby", "nuxt", "svelte",
    "laravel", "django", "flask", "spring", "dotnet", ".net", "unity", "unreal", "tensorflow",
    "pytorch", "keras", "pandas", "numpy", "material ui", "ant design", "chakra ui",
    "styled components",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Intro,
    About,
    Skills,
    Technologies,
    Experience,
    Education,
    Projects,
    Services,
    Clients,
    Achievements,
    Contact,
    Other,
}

fn classify_heading(text: &str) -> Section {
    let t = text.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| t.contains(n));

    if has(&["skill", "expertise", "competenc"]) {
        Section::Skills
    } else if has(&["education", "degree", "university", "school", "academic"]) {
        Section::Education
    } else if has(&["service", "offering", "what i do", "what i offer"]) {
        Section::Services
    } else if has(&["client", "customer", "worked with", "trusted by"]) {
        Section::Clients
    } else if has(&["achievement", "award", "honor", "honour", "recognition", "accomplishment"]) {
        Section::Achievements
    } else if has(&["contact", "get in touch", "reach me", "say hello"]) {
        Section::Contact
    } else if has(&["experience", "employment", "career", "work history"]) {
        Section::Experience
    } else if has(&["project", "portfolio", "selected work", "things i"]) {
        Section::Projects
    } else if has(&["tech", "stack", "tools", "languages", "frameworks"]) {
        Section::Technologies
    } else if has(&["about", "bio", "who i am", "hello", "hi,", "hi!"]) {
        Section::About
    } else {
        Section::Other
    }
}

/// Parse one crawled page into a `SiteExtract`.
pub fn parse_site(url: &str, markdown: &str) -> SiteExtract {
    let mut site = SiteExtract {
        url: url.to_string(),
        ..Default::default()
    };
    let mut section = Section::Intro;

    for line in markdown.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }

        if let Some(caps) = HEADING_RE.captures(line) {
            let level = caps[1].len();
            let text = clean_inline(&caps[2]);
            if level == 1 && site.name.is_none() && !text.is_empty() {
                site.name = Some(text);
                section = Section::Intro;
            } else {
                section = classify_heading(&text);
            }
            continue;
        }

        let list_item = LIST_ITEM_RE.captures(line).map(|c| clean_inline(&c[1]));
        let text = list_item.clone().unwrap_or_else(|| clean_inline(line));
        if text.is_empty() {
            continue;
        }

        match section {
            Section::Intro => {
                if list_item.is_none()
                    && site.headline.is_none()
                    && text.chars().count() <= MAX_HEADLINE_LEN
                {
                    site.headline = Some(text);
                }
            }
            Section::About => {
                if list_item.is_none() && site.bio.is_none() {
                    site.bio = Some(text);
                }
            }
            Section::Skills => push_split(&mut site.skills, &text),
            Section::Technologies => push_split(&mut site.technologies, &text),
            Section::Experience if list_item.is_some() => push_item(&mut site.experience, text),
            Section::Education if list_item.is_some() => push_item(&mut site.education, text),
            Section::Projects if list_item.is_some() => push_item(&mut site.projects, text),
            Section::Services if list_item.is_some() => push_item(&mut site.services, text),
            Section::Achievements if list_item.is_some() => {
                push_item(&mut site.achievements, text)
            }
            Section::Clients if list_item.is_some() => push_item(&mut site.clients, text),
            // Client walls are often one comma-separated line.
            Section::Clients => push_split(&mut site.clients, &text),
            Section::Contact => push_item(&mut site.contact, text),
            _ => {}
        }
    }

    for email in extract_emails(markdown) {
        if !site.contact.iter().any(|c| c.to_lowercase().contains(&email)) {
            push_item(&mut site.contact, email);
        }
    }
    site.location = extract_location(markdown);

    let lower = markdown.to_lowercase();
    let mut technologies = std::mem::take(&mut site.technologies);
    technologies.extend(scan_technologies(&lower));
    site.technologies = sorted_unique(technologies);
    site.skills = sorted_unique(std::mem::take(&mut site.skills));
    site.site_type = classify_site(&lower);

    site
}

/// Strip inline markdown: links to their text, emphasis and code markers.
fn clean_inline(text: &str) -> String {
    let text = LINK_RE.replace_all(text, "$1");
    text.replace("**", "")
        .replace("__", "")
        .replace('`', "")
        .trim()
        .trim_matches(|c: char| c == '*' || c == '_' || c == '>' || c == '|')
        .trim()
        .to_string()
}

fn push_item(list: &mut Vec<String>, item: String) {
    if list.len() < MAX_ITEMS {
        list.push(item);
    }
}

/// Skills and stacks are often comma lists on one line.
fn push_split(list: &mut Vec<String>, text: &str) {
    for part in text.split([',', '|', '•', ';', '/']) {
        let part = part.trim().trim_end_matches('.').trim();
        if !part.is_empty() && part.chars().count() <= 60 {
            push_item(list, part.to_string());
        }
    }
}

/// Lowercased addresses in page order, without duplicates.
fn extract_emails(markdown: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    EMAIL_RE
        .captures_iter(markdown)
        .filter(|caps| !ASSET_EXTENSIONS.contains(&caps[1].to_ascii_lowercase().as_str()))
        .map(|caps| caps[0].to_ascii_lowercase())
        .filter(|email| seen.insert(email.clone()))
        .collect()
}

fn extract_location(markdown: &str) -> Option<String> {
    LOCATION_RE.captures_iter(markdown).find_map(|caps| {
        let place = clean_inline(&caps[1]);
        let place = place.split(" and ").next().unwrap_or_default().trim();
        place
            .chars()
            .next()
            .is_some_and(char::is_uppercase)
            .then(|| place.to_string())
    })
}

/// Known technology names appearing as whole words in lowercased text.
pub fn scan_technologies(lower: &str) -> Vec<String> {
    TECH_KEYWORDS
        .iter()
        .filter(|kw| contains_term(lower, kw))
        .map(|kw| kw.to_string())
        .collect()
}

fn contains_term(haystack: &str, term: &str) -> bool {
    haystack.match_indices(term).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + term.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

fn classify_site(lower: &str) -> SiteType {
    let any = |terms: &[&str]| terms.iter().any(|t| contains_term(lower, t));
    if any(&["portfolio", "resume", "cv", "about me"]) {
        SiteType::Portfolio
    } else if any(&["blog", "articles", "posts"]) {
        SiteType::Blog
    } else if any(&["freelance", "services", "hire", "consulting"]) {
        SiteType::ProfessionalServices
    } else {
        SiteType::General
    }
}

/// Sort case-insensitively, keeping the first spelling of each entry.
pub fn sorted_unique(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out: Vec<String> = items
        .into_iter()
        .filter(|i| seen.insert(i.to_lowercase()))
        .collect();
    out.sort_by_key(|i| i.to_lowercase());
    out
}
