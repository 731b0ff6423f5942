//! Deterministic intent classification for common English phrasings.
//!
//! The classifier never touches the store. It picks an operation from the
//! leading verb, pulls names and phone numbers out of the remaining text, and
//! leaves missing or blank slots to argument validation. Commands with more
//! than one phone number, or a name that is digits or a word such as "all",
//! are rejected rather than guessed at.

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::classifier::{Classification, IntentClassifier, RejectReason};
use crate::operations::Operation;

static POLITE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:please|kindly|(?:can|could|would|will)\s+you(?:\s+please)?|i\s+(?:want|need|would\s+like)\s+to)[\s,]+",
    )
    .expect("Failed to compile polite prefix regex")
});

static TRAILING_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:[,\s]+please)?[\s.!?]*$").expect("Failed to compile trailing noise regex")
});

static LIST_COMMAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)^(?:",
        r"(?:list|show|display|print|give|get|see|view)(?:\s+me)?(?:\s+all)?(?:\s+of)?(?:\s+(?:my|the))?",
        r"\s+(?:contacts|phonebook|phone\s+book|entries|(?:phone\s+)?numbers|contact\s+list|address\s+book)",
        r"|list(?:\s+(?:all|everyone|everything))?",
        r"|(?:all\s+)?(?:my\s+)?contacts",
        r"|(?:what|who)(?:'s|\s+is|\s+are)\s+(?:in|on)\s+(?:my|the)\s+(?:phonebook|phone\s+book|contacts|contact\s+list)",
        r")$",
    ))
    .expect("Failed to compile list command regex")
});

static PHONEBOOK_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\s*\b(?:from|in|to|into|on)\s+(?:my|the)\s+(?:phonebook|phone\s+book|contacts|contact\s+list|address\s+book)\b",
    )
    .expect("Failed to compile phonebook reference regex")
});

static PHONE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+?\(?\d[\d\s\-().]*\d").expect("Failed to compile phone regex"));

static RENAME_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s+(?:to|into|as)\s+").expect("Failed to compile rename separator regex")
});

static NAME_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bnames?\b").expect("Failed to compile name word regex"));

static NUMBER_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:number|phone|mobile|cell)\b").expect("Failed to compile number word regex")
});

const MIN_PHONE_DIGITS: usize = 3;

const CREATE_VERBS: &[&str] = &["add", "create", "save", "store", "insert", "new", "put", "record"];
const DELETE_VERBS: &[&str] = &["delete", "remove", "erase", "forget", "drop"];
const UPDATE_VERBS: &[&str] = &["update", "change", "modify", "set", "edit", "replace"];
const GET_VERBS: &[&str] = &[
    "get", "show", "find", "lookup", "what", "what's", "whats", "who", "who's", "tell", "give",
    "fetch", "search", "display",
];

const FILLER_WORDS: &[&str] = &[
    "a", "an", "the", "new", "contact", "contacts", "named", "called", "name", "with", "number",
    "phone", "mobile", "cell", "is", "to", "as", "at", "for", "of", "me", "my", "please", "entry",
    "person", "and", "under", "his", "her", "their", "details", "info",
];

const NOT_A_NAME: &[&str] = &[
    "all", "everyone", "everybody", "everything", "anyone", "anybody", "someone", "somebody",
    "them", "it", "one",
];

const TOKEN_EDGES: &[char] =
    &[',', ';', ':', '!', '?', '.', '"', '\'', '“', '”', '‘', '(', ')', '[', ']'];

#[derive(Clone, Debug, Default)]
pub struct RuleBasedClassifier;

impl RuleBasedClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify_text(&self, command: &str) -> Classification {
        let text = normalize_command(command);
        if text.is_empty() {
            return Classification::unclassified();
        }
        if LIST_COMMAND.is_match(&text) {
            return invoke(Operation::ListContacts, Map::new());
        }

        let text = PHONEBOOK_REFERENCE.replace_all(&text, "").trim().to_string();
        let (verb, rest) = split_verb(&text);

        match verb.as_str() {
            "rename" => rename(rest),
            "list" => invoke(Operation::ListContacts, Map::new()),
            verb if CREATE_VERBS.contains(&verb) => create(rest),
            verb if DELETE_VERBS.contains(&verb) => name_only(Operation::DeleteContact, rest),
            verb if UPDATE_VERBS.contains(&verb) => update(rest),
            verb if GET_VERBS.contains(&verb) => name_only(Operation::GetContact, rest),
            _ if NUMBER_WORD.is_match(&text) => name_only(Operation::GetContact, &text),
            _ => Classification::unclassified(),
        }
    }
}

#[async_trait]
impl IntentClassifier for RuleBasedClassifier {
    async fn classify(&self, command: &str) -> Result<Classification> {
        Ok(self.classify_text(command))
    }
}

fn normalize_command(command: &str) -> String {
    let mut text = command.trim().replace('’', "'");
    loop {
        let stripped = POLITE_PREFIX.replace(&text, "").to_string();
        if stripped == text {
            break;
        }
        text = stripped;
    }
    TRAILING_NOISE.replace(&text, "").trim().to_string()
}

/// Splits off the leading verb, lowercased. "look up" counts as one verb.
fn split_verb(text: &str) -> (String, &str) {
    let (first, rest) = split_first_word(text);
    let verb = first.trim_matches(TOKEN_EDGES).to_lowercase();
    if verb == "look" {
        let (second, after) = split_first_word(rest);
        if second.eq_ignore_ascii_case("up") {
            return ("lookup".to_string(), after);
        }
    }
    (verb, rest)
}

fn split_first_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(index) => (&text[..index], text[index..].trim_start()),
        None => (text, ""),
    }
}

fn invoke(operation: Operation, arguments: Map<String, Value>) -> Classification {
    Classification::Invoke { operation, arguments: Value::Object(arguments) }
}

fn insert_if_some(arguments: &mut Map<String, Value>, key: &str, value: Option<String>) {
    if let Some(value) = value {
        arguments.insert(key.to_string(), json!(value));
    }
}

/// A slot had more than one candidate value, or a value that cannot be used.
struct Ambiguous;

fn ambiguous(operation: Operation) -> Classification {
    Classification::Rejected {
        reason: RejectReason::AmbiguousArguments,
        message: operation.clarification().to_string(),
    }
}

fn create(rest: &str) -> Classification {
    match name_and_phone(rest) {
        Ok((name, phone)) => {
            let mut arguments = Map::new();
            insert_if_some(&mut arguments, "name", name);
            insert_if_some(&mut arguments, "phone", phone);
            invoke(Operation::CreateContact, arguments)
        }
        Err(Ambiguous) => ambiguous(Operation::CreateContact),
    }
}

fn update(rest: &str) -> Classification {
    let no_phone = matches!(find_phone(rest), Ok(None));
    if no_phone && NAME_WORD.is_match(rest) && !NUMBER_WORD.is_match(rest) {
        return rename(rest);
    }

    match name_and_phone(rest) {
        Ok((name, phone)) => {
            let mut arguments = Map::new();
            insert_if_some(&mut arguments, "name", name);
            insert_if_some(&mut arguments, "phone", phone);
            invoke(Operation::UpdateContact, arguments)
        }
        Err(Ambiguous) => ambiguous(Operation::UpdateContact),
    }
}

fn rename(rest: &str) -> Classification {
    let names = match RENAME_SEPARATOR.find(rest) {
        Some(separator) => clean_name(&rest[..separator.start()])
            .and_then(|old| Ok((old, clean_name(&rest[separator.end()..])?))),
        None => clean_name(rest).map(|old| (old, None)),
    };

    match names {
        Ok((old_name, new_name)) => {
            let mut arguments = Map::new();
            insert_if_some(&mut arguments, "old_name", old_name);
            insert_if_some(&mut arguments, "new_name", new_name);
            invoke(Operation::RenameContact, arguments)
        }
        Err(Ambiguous) => ambiguous(Operation::RenameContact),
    }
}

fn name_only(operation: Operation, rest: &str) -> Classification {
    match clean_name(rest) {
        Ok(name) => {
            let mut arguments = Map::new();
            insert_if_some(&mut arguments, "name", name);
            invoke(operation, arguments)
        }
        Err(Ambiguous) => ambiguous(operation),
    }
}

/// The name is taken from the text before the phone number, or after it when
/// nothing useful precedes it.
fn name_and_phone(text: &str) -> Result<(Option<String>, Option<String>), Ambiguous> {
    match find_phone(text)? {
        Some((start, end)) => {
            let name = match clean_name(&text[..start])? {
                Some(name) => Some(name),
                None => clean_name(&text[end..])?,
            };
            Ok((name, Some(text[start..end].trim().to_string())))
        }
        None => Ok((clean_name(text)?, None)),
    }
}

/// The single phone number in `text`. Two or more candidates are ambiguous.
fn find_phone(text: &str) -> Result<Option<(usize, usize)>, Ambiguous> {
    let mut candidates = PHONE_NUMBER.find_iter(text).filter(|candidate| {
        candidate.as_str().chars().filter(char::is_ascii_digit).count() >= MIN_PHONE_DIGITS
    });

    let first = candidates.next();
    if candidates.next().is_some() {
        return Err(Ambiguous);
    }
    Ok(first.map(|candidate| (candidate.start(), candidate.end())))
}

/// Strips filler words and a trailing possessive. Names made of digits or of
/// a word that stands for several contacts are rejected.
fn clean_name(segment: &str) -> Result<Option<String>, Ambiguous> {
    let mut tokens = segment
        .split_whitespace()
        .map(|token| token.trim_matches(TOKEN_EDGES).to_string())
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>();

    strip_fillers(&mut tokens);
    if let Some(last) = tokens.last_mut() {
        if let Some(stripped) = strip_possessive(last) {
            *last = stripped;
        }
    }
    strip_fillers(&mut tokens);

    if tokens.iter().any(|token| token.chars().any(|ch| ch.is_ascii_digit())) {
        return Err(Ambiguous);
    }
    if let [only] = tokens.as_slice() {
        if NOT_A_NAME.contains(&only.to_lowercase().as_str()) {
            return Err(Ambiguous);
        }
    }

    Ok((!tokens.is_empty()).then(|| tokens.join(" ")))
}

fn strip_possessive(token: &str) -> Option<String> {
    let stripped = token.strip_suffix("'s").or_else(|| token.strip_suffix("'S"))?;
    (!stripped.is_empty()).then(|| stripped.to_string())
}

fn is_filler(token: &str) -> bool {
    FILLER_WORDS.contains(&token.to_lowercase().as_str())
}

fn strip_fillers(tokens: &mut Vec<String>) {
    while tokens.first().is_some_and(|token| is_filler(token)) {
        tokens.remove(0);
    }
    while tokens.last().is_some_and(|token| is_filler(token)) {
        tokens.pop();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::RuleBasedClassifier;
    use crate::classifier::{Classification, IntentClassifier, RejectReason};
    use crate::operations::Operation;

    fn classify(command: &str) -> Classification {
        RuleBasedClassifier::new().classify_text(command)
    }

    fn assert_invokes(command: &str, operation: Operation, arguments: serde_json::Value) {
        assert_eq!(
            classify(command),
            Classification::Invoke { operation, arguments },
            "command: {command}"
        );
    }

    #[test]
    fn create_phrasings() {
        let expected = json!({"name": "Alice", "phone": "123456789"});
        assert_invokes("add Alice, phone 123456789", Operation::CreateContact, expected.clone());
        assert_invokes(
            "add Alice with number 123456789",
            Operation::CreateContact,
            expected.clone(),
        );
        assert_invokes(
            "Please add a new contact named Alice with phone 123456789.",
            Operation::CreateContact,
            expected.clone(),
        );
        assert_invokes(
            "save Alice to my phonebook, her number is 123456789",
            Operation::CreateContact,
            expected.clone(),
        );
        assert_invokes("add 123456789 for Alice", Operation::CreateContact, expected);
        assert_invokes(
            "add John Smith +1 (555) 123-4567",
            Operation::CreateContact,
            json!({"name": "John Smith", "phone": "+1 (555) 123-4567"}),
        );
    }

    #[test]
    fn create_without_phone_keeps_partial_arguments() {
        assert_invokes("add Alice", Operation::CreateContact, json!({"name": "Alice"}));
    }

    #[test]
    fn delete_phrasings() {
        assert_invokes("delete Bob", Operation::DeleteContact, json!({"name": "Bob"}));
        assert_invokes(
            "remove the contact Bob Marley from my phonebook",
            Operation::DeleteContact,
            json!({"name": "Bob Marley"}),
        );
    }

    #[test]
    fn update_phrasings() {
        let expected = json!({"name": "Alice", "phone": "987654321"});
        assert_invokes("change Alice's number to 987654321", Operation::UpdateContact, expected.clone());
        assert_invokes("update Alice to 987654321", Operation::UpdateContact, expected.clone());
        assert_invokes(
            "update the phone number for Alice to 987654321",
            Operation::UpdateContact,
            expected,
        );
    }

    #[test]
    fn rename_phrasings() {
        assert_invokes(
            "rename Alice to Alicia",
            Operation::RenameContact,
            json!({"old_name": "Alice", "new_name": "Alicia"}),
        );
        assert_invokes(
            "rename contact 'Patrycja Evans' to 'Patrycja Michelli'",
            Operation::RenameContact,
            json!({"old_name": "Patrycja Evans", "new_name": "Patrycja Michelli"}),
        );
        assert_invokes(
            "change Alice's name to Alicia",
            Operation::RenameContact,
            json!({"old_name": "Alice", "new_name": "Alicia"}),
        );
        assert_invokes("rename Alice", Operation::RenameContact, json!({"old_name": "Alice"}));
    }

    #[test]
    fn lookup_phrasings() {
        let expected = json!({"name": "Carol"});
        assert_invokes("what's Carol's number", Operation::GetContact, expected.clone());
        assert_invokes("What’s Carol’s number?", Operation::GetContact, expected.clone());
        assert_invokes("what is the phone number of Carol?", Operation::GetContact, expected.clone());
        assert_invokes("look up Carol", Operation::GetContact, expected.clone());
        assert_invokes("Carol's number", Operation::GetContact, expected);
    }

    #[test]
    fn list_phrasings() {
        for command in [
            "list all contacts",
            "show all contacts",
            "Show me all of my contacts.",
            "list",
            "what's in my phonebook?",
            "can you list my contacts please",
        ] {
            assert_invokes(command, Operation::ListContacts, json!({}));
        }
    }

    #[test]
    fn unknown_phrasing_is_unclassified() {
        for command in ["", "   ", "hello there", "sing me a song"] {
            assert!(
                matches!(
                    classify(command),
                    Classification::Rejected { reason: RejectReason::Unclassified, .. }
                ),
                "command: {command}"
            );
        }
    }

    #[test]
    fn ambiguous_slots_are_rejected_instead_of_guessed() {
        for (command, operation) in [
            ("add Alice 123456789 and Bob 987654321", Operation::CreateContact),
            ("add Agent 007 with number 123456", Operation::CreateContact),
            ("change number 555 to 666", Operation::UpdateContact),
            ("show all", Operation::GetContact),
            ("delete everyone", Operation::DeleteContact),
            ("rename Alice to 12345", Operation::RenameContact),
        ] {
            assert_eq!(
                classify(command),
                Classification::Rejected {
                    reason: RejectReason::AmbiguousArguments,
                    message: operation.clarification().to_string(),
                },
                "command: {command}"
            );
        }
    }

    #[test]
    fn single_grouped_number_is_not_ambiguous() {
        assert_invokes(
            "add Bob, phone 555 123 4567",
            Operation::CreateContact,
            json!({"name": "Bob", "phone": "555 123 4567"}),
        );
    }

    #[tokio::test]
    async fn trait_classification_matches_direct_call() {
        let classifier = RuleBasedClassifier::new();
        let classification = classifier.classify("delete Bob").await.expect("classify");

        assert_eq!(classification, classify("delete Bob"));
    }
}
