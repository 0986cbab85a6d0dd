//! Metric identity and description derivation.
//!
//! Operation-set and operation names are split into words the same way
//! regardless of how they were written (`findOne`, `find_one`, `FindOne`), so
//! the identity of an operation is stable across naming styles.

/// Architectural role tokens stripped from the end of an operation-set name.
pub const ROLE_SUFFIXES: &[&str] = &["repository", "controller", "provider", "service", "module"];

/// Unit for every operation duration.
pub const DURATION_UNIT: &str = "ms";

/// Metric identity for an operation.
///
/// ```
/// use opmeter::naming::metric_identity;
///
/// assert_eq!(metric_identity("UserRepository", "findOne"), "user.find_one.duration");
/// assert_eq!(metric_identity("MediaService", "getAll"), "media.get_all.duration");
/// ```
pub fn metric_identity(set_name: &str, operation: &str) -> String {
    format!(
        "{}.{}.duration",
        strip_role_suffix(&snake_case(set_name)),
        snake_case(operation)
    )
}

/// Human-readable description for an operation's duration histogram.
pub fn metric_description(set_name: &str, operation: &str) -> String {
    format!(
        "The elapsed time in {} for the {} to {}",
        DURATION_UNIT,
        start_case(set_name),
        start_case(operation).to_lowercase()
    )
}

/// Whether an operation name denotes a constructor rather than an operation.
pub fn is_constructor(operation: &str) -> bool {
    matches!(operation, "new" | "constructor")
}

/// `snake_case` form of a name.
pub fn snake_case(name: &str) -> String {
    words(name)
        .iter()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// `Start Case` form of a name.
pub fn start_case(name: &str) -> String {
    words(name)
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

// "user_repository" -> "user", with the separator supplied by the caller.
fn strip_role_suffix(snake: &str) -> &str {
    for role in ROLE_SUFFIXES {
        if let Some(stem) = snake.strip_suffix(role) {
            if let Some(stem) = stem.strip_suffix('_') {
                if !stem.is_empty() {
                    return stem;
                }
            }
        }
    }
    snake
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Lower,
    Upper,
    Digit,
}

fn classify(c: char) -> Option<CharClass> {
    if c.is_lowercase() {
        Some(CharClass::Lower)
    } else if c.is_uppercase() {
        Some(CharClass::Upper)
    } else if c.is_numeric() {
        Some(CharClass::Digit)
    } else if c.is_alphabetic() {
        Some(CharClass::Lower)
    } else {
        None
    }
}

/// Split a name into words.
///
/// Boundaries are non-alphanumeric characters, lower->upper transitions,
/// letter<->digit transitions, and the last capital of an acronym that starts
/// a new capitalized word (`HTTPClient` -> `HTTP`, `Client`).
fn words(name: &str) -> Vec<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev: Option<CharClass> = None;

    for (i, &c) in chars.iter().enumerate() {
        let Some(class) = classify(c) else {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev = None;
            continue;
        };

        let boundary = match (prev, class) {
            (Some(CharClass::Lower), CharClass::Upper) => true,
            (Some(CharClass::Digit), CharClass::Lower | CharClass::Upper) => true,
            (Some(CharClass::Lower | CharClass::Upper), CharClass::Digit) => true,
            (Some(CharClass::Upper), CharClass::Upper) => chars
                .get(i + 1)
                .and_then(|&next| classify(next))
                .is_some_and(|next| next == CharClass::Lower),
            _ => false,
        };

        if boundary && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        current.push(c);
        prev = Some(class);
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}
