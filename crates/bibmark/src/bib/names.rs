//! BibTeX name list parsing (`First von Last`, `von Last, Jr, First`).

use crate::domain::model::Person;

/// Split a name list on top-level `and` and parse each name.
pub fn parse_names(raw: &str) -> Vec<Person> {
    let words = split_words(raw);
    words
        .split(|word| word.eq_ignore_ascii_case("and"))
        .filter(|name| !name.is_empty())
        .map(|name| parse_person(&name.join(" ")))
        .collect()
}

/// Parse a single name into its BibTeX parts.
pub fn parse_person(name: &str) -> Person {
    let parts: Vec<Vec<String>> = split_commas(name)
        .iter()
        .map(|part| split_words(part))
        .collect();

    let mut person = Person::default();
    match parts.as_slice() {
        [] => {}
        [words] if words.is_empty() => {}
        [words] => {
            if words.len() == 1 {
                person.last = words.clone();
                return person;
            }
            let body = &words[..words.len() - 1];
            match body.iter().position(|word| is_lowercase_word(word)) {
                Some(von_start) => {
                    let von_end = body
                        .iter()
                        .rposition(|word| is_lowercase_word(word))
                        .unwrap_or(von_start);
                    set_first_names(&mut person, &words[..von_start]);
                    person.prelast = words[von_start..=von_end].to_vec();
                    person.last = words[von_end + 1..].to_vec();
                }
                None => {
                    set_first_names(&mut person, body);
                    person.last = vec![words[words.len() - 1].clone()];
                }
            }
        }
        [von_last, rest @ ..] => {
            let (prelast, last) = split_von_last(von_last);
            person.prelast = prelast;
            person.last = last;
            match rest {
                [first] => set_first_names(&mut person, first),
                [lineage, first, ..] => {
                    person.lineage = lineage.clone();
                    set_first_names(&mut person, first);
                }
                [] => {}
            }
        }
    }
    person
}

/// Whether a person entry is the BibTeX `others` placeholder.
pub fn is_others(person: &Person) -> bool {
    person.first.is_empty()
        && person.prelast.is_empty()
        && person.last.len() == 1
        && person.last[0] == "others"
}

fn set_first_names(person: &mut Person, words: &[String]) {
    if let Some((first, middle)) = words.split_first() {
        person.first = vec![first.clone()];
        person.middle = middle.to_vec();
    }
}

fn split_von_last(words: &[String]) -> (Vec<String>, Vec<String>) {
    if words.len() <= 1 {
        return (Vec::new(), words.to_vec());
    }
    let body = &words[..words.len() - 1];
    match body.iter().rposition(|word| is_lowercase_word(word)) {
        Some(von_end) => (words[..=von_end].to_vec(), words[von_end + 1..].to_vec()),
        None => (Vec::new(), words.to_vec()),
    }
}

/// A word belongs to the `von` part when its first top-level letter is lowercase.
fn is_lowercase_word(word: &str) -> bool {
    let mut depth = 0usize;
    let mut chars = word.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '{' => {
                // `{\relax ...}` style special characters carry their own case.
                if depth == 0 && chars.peek() == Some(&'\\') {
                    chars.next();
                    let mut command = String::new();
                    while let Some(&next) = chars.peek() {
                        if !next.is_ascii_alphabetic() {
                            break;
                        }
                        command.push(next);
                        chars.next();
                    }
                    if command.len() > 1 {
                        return command.chars().next().is_some_and(char::is_lowercase);
                    }
                    depth += 1;
                    continue;
                }
                depth += 1;
            }
            '}' => depth = depth.saturating_sub(1),
            c if depth == 0 && c.is_alphabetic() => return c.is_lowercase(),
            c if depth == 1 && c.is_alphabetic() && word.starts_with("{\\") => {
                return c.is_lowercase();
            }
            _ => {}
        }
    }
    false
}

/// Split on whitespace and `~` outside of braces.
fn split_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for ch in text.chars() {
        match ch {
            '{' => {
                depth += 1;
                current.push(ch);
            }
            '}' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            c if depth == 0 && (c.is_whitespace() || c == '~') => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn split_commas(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for ch in text.chars() {
        match ch {
            '{' => {
                depth += 1;
                current.push(ch);
            }
            '}' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => parts.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    parts.push(current);
    parts
        .into_iter()
        .map(|part| part.trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(raw: &str) -> Vec<String> {
        parse_names(raw).iter().map(Person::full_name).collect()
    }

    #[test]
    fn first_last_order() {
        let person = parse_person("Judea Pearl");
        assert_eq!(person.first, ["Judea"]);
        assert_eq!(person.last, ["Pearl"]);
    }

    #[test]
    fn last_comma_first_with_middle_names() {
        let person = parse_person("Hamilton, James Douglas");
        assert_eq!(person.first, ["James"]);
        assert_eq!(person.middle, ["Douglas"]);
        assert_eq!(person.last, ["Hamilton"]);
    }

    #[test]
    fn von_particles_are_detected() {
        let person = parse_person("Ludwig van Beethoven");
        assert_eq!(person.prelast, ["van"]);
        assert_eq!(person.last, ["Beethoven"]);

        let person = parse_person("de la Fontaine, Jean");
        assert_eq!(person.prelast, ["de", "la"]);
        assert_eq!(person.last, ["Fontaine"]);
        assert_eq!(person.first, ["Jean"]);
    }

    #[test]
    fn blank_names_parse_to_empty_person() {
        assert_eq!(parse_person(""), Person::default());
        assert_eq!(parse_person("   "), Person::default());
        assert_eq!(parse_person(", Jane").first, ["Jane"]);
    }

    #[test]
    fn lineage_in_three_part_form() {
        let person = parse_person("King, Jr, Martin Luther");
        assert_eq!(person.lineage, ["Jr"]);
        assert_eq!(person.full_name(), "Martin Luther King, Jr");
    }

    #[test]
    fn braces_protect_and_and_commas() {
        assert_eq!(
            names("{Barnes and Noble, Inc.} and Jane Doe"),
            ["{Barnes and Noble, Inc.}", "Jane Doe"]
        );
    }

    #[test]
    fn others_placeholder() {
        let people = parse_names("Jane Doe and others");
        assert_eq!(people.len(), 2);
        assert!(is_others(&people[1]));
    }
}
