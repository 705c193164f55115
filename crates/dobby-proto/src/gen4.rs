//! The text wire protocol spoken by the Compu-Dobby IV: a line-oriented
//! protocol over TCP where every line the loom sends terminates with `>`
//! instead of a newline (spec §4.5 "Generation 4 (text)").
//!
//! Input bytes are normalised before parsing: lowercased, with `\r`/`\n`
//! stripped — the loom's own text is not case- or line-ending-stable.

/// A decoded `loom -> host` line, with the trailing `>` already stripped
/// by the frame reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gen4Frame {
    /// `<compu-dobby iv,NN,pos dobby|neg dobby...>`, sent once at connect.
    Greeting { shafts: u32, negative: bool },
    /// `<password:>`.
    Password,
    Ready,
    Down,
    Up,
    ArmNull,
    What,
    Error(String),
    Unknown(String),
}

const GREETING_PREFIX: &str = "<compu-dobby iv";

/// `max_shafts` only ever takes one of these values (spec §3 Draft); a
/// greeting claiming anything else is an illegal shaft count.
fn is_legal_shaft_count(n: u32) -> bool {
    n > 0 && n <= 40 && n % 4 == 0
}

pub fn parse_gen4_frame(raw: &str) -> Gen4Frame {
    let cleaned: String = raw.chars().filter(|&c| c != '\r' && c != '\n').collect();
    let s = cleaned.to_lowercase();
    let s = s.trim();

    if let Some(rest) = s.strip_prefix(GREETING_PREFIX) {
        let shafts = rest
            .split(|c: char| !c.is_ascii_digit())
            .find(|tok| !tok.is_empty())
            .and_then(|tok| tok.parse::<u32>().ok());
        let negative = rest.contains("neg dobby");
        return match shafts {
            Some(shafts) if is_legal_shaft_count(shafts) => Gen4Frame::Greeting { shafts, negative },
            _ => Gen4Frame::Error(format!("illegal shaft count in greeting: {s:?}")),
        };
    }

    match s {
        "<password:" => Gen4Frame::Password,
        "<ready" => Gen4Frame::Ready,
        "<down" => Gen4Frame::Down,
        "<up" => Gen4Frame::Up,
        "<arm null" => Gen4Frame::ArmNull,
        "<what" => Gen4Frame::What,
        other if other.starts_with("<error") => {
            Gen4Frame::Error(other.trim_start_matches('<').to_string())
        }
        other => Gen4Frame::Unknown(other.to_string()),
    }
}

/// Compu-Dobby IV firmware ships with this fixed password; it has no user
/// configuration surface anywhere in the original tool (open question in
/// spec §9, preserved verbatim rather than inferred).
const PASSWORD: &str = "chico";

pub fn encode_password() -> String {
    format!("{PASSWORD}\r")
}

pub fn encode_clear() -> String {
    "clear\r".to_string()
}

/// `shafts` are 1-based shaft numbers to raise on this pick — the text
/// protocol lists them as a comma-separated sequence rather than a mask.
pub fn encode_pick(shafts: &[u32]) -> String {
    let joined = shafts
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("pick {joined}\r")
}

pub fn encode_close() -> String {
    "close\r".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_greeting_positive_dobby() {
        assert_eq!(
            parse_gen4_frame("<compu-dobby iv,24,pos dobby"),
            Gen4Frame::Greeting {
                shafts: 24,
                negative: false
            }
        );
    }

    #[test]
    fn parses_greeting_negative_dobby_case_insensitively() {
        assert_eq!(
            parse_gen4_frame("<COMPU-DOBBY IV,8,NEG DOBBY"),
            Gen4Frame::Greeting {
                shafts: 8,
                negative: true
            }
        );
    }

    #[test]
    fn rejects_illegal_shaft_count() {
        match parse_gen4_frame("<compu-dobby iv,99,pos dobby") {
            Gen4Frame::Error(msg) => assert!(msg.contains("illegal shaft count")),
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[test]
    fn parses_simple_tokens() {
        assert_eq!(parse_gen4_frame("<password:"), Gen4Frame::Password);
        assert_eq!(parse_gen4_frame("<ready"), Gen4Frame::Ready);
        assert_eq!(parse_gen4_frame("<down"), Gen4Frame::Down);
        assert_eq!(parse_gen4_frame("<up"), Gen4Frame::Up);
        assert_eq!(parse_gen4_frame("<arm null"), Gen4Frame::ArmNull);
        assert_eq!(parse_gen4_frame("<what"), Gen4Frame::What);
    }

    #[test]
    fn strips_carriage_return_and_lowercases() {
        assert_eq!(parse_gen4_frame("<READY\r"), Gen4Frame::Ready);
    }

    #[test]
    fn unrecognised_line_is_preserved() {
        assert_eq!(
            parse_gen4_frame("<something else"),
            Gen4Frame::Unknown("<something else".to_string())
        );
    }

    #[test]
    fn encodes_pick_as_comma_list() {
        assert_eq!(encode_pick(&[1, 3, 5]), "pick 1,3,5\r");
        assert_eq!(encode_pick(&[]), "pick \r");
    }

    #[test]
    fn encodes_close_and_clear() {
        assert_eq!(encode_clear(), "clear\r");
        assert_eq!(encode_close(), "close\r");
    }
}
