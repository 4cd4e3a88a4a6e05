// Cross-source consistency checks. Informational only; nothing here feeds the score.

use devsignal_common::{
    Consistency, CorrelationCheck, CorrelationReport, IdentityAttributes, ProfessionalSection,
    WebsiteSection,
};

pub const BIO_VS_PROFESSIONAL_HEADLINE: &str = "bio~professional_headline";
pub const BIO_VS_WEBSITE_HEADLINE: &str = "bio~website_headline";
pub const PROFESSIONAL_VS_WEBSITE_HEADLINE: &str = "professional_headline~website_headline";
pub const LOCATION_PRIMARY_VS_PROFESSIONAL: &str = "location:primary=professional";
pub const LOCATION_PRIMARY_VS_WEBSITE: &str = "location:primary=website";
pub const NAME_PRIMARY_VS_PROFESSIONAL: &str = "name:primary=professional";

/// All checks, always in the same order. A missing side yields `NotComparable`.
pub fn correlate(
    attributes: &IdentityAttributes,
    website: &WebsiteSection,
    professional: &ProfessionalSection,
) -> CorrelationReport {
    let bio = attributes.bio.as_deref();
    let location = attributes.location.as_deref();

    CorrelationReport {
        checks: vec![
            containment(BIO_VS_PROFESSIONAL_HEADLINE, bio, professional.headline()),
            containment(BIO_VS_WEBSITE_HEADLINE, bio, website.headline()),
            containment(
                PROFESSIONAL_VS_WEBSITE_HEADLINE,
                professional.headline(),
                website.headline(),
            ),
            equality(LOCATION_PRIMARY_VS_PROFESSIONAL, location, professional.location()),
            equality(LOCATION_PRIMARY_VS_WEBSITE, location, website.location()),
            equality(
                NAME_PRIMARY_VS_PROFESSIONAL,
                attributes.name.as_deref(),
                professional.full_name(),
            ),
        ],
    }
}

/// Case-insensitive substring in either direction.
pub fn containment(name: &str, left: Option<&str>, right: Option<&str>) -> CorrelationCheck {
    compare(name, left, right, |l, r| l.contains(r) || r.contains(l))
}

/// Case-insensitive, whitespace-trimmed equality.
pub fn equality(name: &str, left: Option<&str>, right: Option<&str>) -> CorrelationCheck {
    compare(name, left, right, |l, r| l == r)
}

fn compare(
    name: &str,
    left: Option<&str>,
    right: Option<&str>,
    agrees: impl Fn(&str, &str) -> bool,
) -> CorrelationCheck {
    let outcome = match (normalize(left), normalize(right)) {
        (Some(l), Some(r)) if agrees(&l, &r) => Consistency::Consistent,
        (Some(_), Some(_)) => Consistency::Divergent,
        _ => Consistency::NotComparable,
    };
    CorrelationCheck {
        name: name.to_string(),
        left: left.map(str::to_string),
        right: right.map(str::to_string),
        outcome,
    }
}

fn normalize(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
}
