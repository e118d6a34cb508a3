//! Selecting a declared content-type key for a concrete `Content-Type`

/// Pick the declared key that best matches a concrete content type.
///
/// Priority: exact (case-insensitive), exact after stripping `;` parameters,
/// `type/*`, `*/*`. An absent or empty concrete type only matches an empty
/// declared key.
#[must_use]
pub fn select<'k>(declared: &[&'k str], concrete: Option<&str>) -> Option<&'k str> {
    let concrete = concrete.map(str::trim).filter(|c| !c.is_empty());
    let Some(concrete) = concrete else {
        return declared.iter().find(|key| key.trim().is_empty()).copied();
    };

    let find = |wanted: &str| {
        declared
            .iter()
            .find(|key| key.trim().eq_ignore_ascii_case(wanted))
            .copied()
    };

    if let Some(key) = find(concrete) {
        return Some(key);
    }
    let essence = essence(concrete);
    if let Some(key) = find(essence) {
        return Some(key);
    }
    if let Some((primary, _)) = essence.split_once('/') {
        if let Some(key) = find(&format!("{primary}/*")) {
            return Some(key);
        }
    }
    find("*/*")
}

/// Media type without parameters: `application/json; charset=utf-8` gives
/// `application/json`.
#[must_use]
pub fn essence(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or("").trim()
}

/// `application/json` and any `+json` structured suffix.
#[must_use]
pub fn is_json(content_type: &str) -> bool {
    let essence = essence(content_type).to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

#[must_use]
pub fn is_form(content_type: &str) -> bool {
    essence(content_type).eq_ignore_ascii_case("application/x-www-form-urlencoded")
}

#[must_use]
pub fn is_multipart(content_type: &str) -> bool {
    essence(content_type).eq_ignore_ascii_case("multipart/form-data")
}
