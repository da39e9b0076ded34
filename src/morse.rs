//! Morse table codec
//!
//! Bidirectional mapping between Morse code strings and characters. Used by
//! the assembler to resolve accumulated codes to text, and standalone for
//! direct text-to-Morse transcoding.
//!
//! Unmapped codes resolve to `'?'` and unmapped characters encode as the
//! code for `'?'`, so decoding never drops output silently.

/// Token representing a word space in the text transcoding direction
pub const WORD_SEPARATOR: &str = "/";

/// Code emitted for characters with no table entry
pub const UNKNOWN_CODE: &str = "..--..";

/// Character emitted for codes with no table entry
pub const UNKNOWN_CHAR: char = '?';

/// Fixed bijective mapping between characters and Morse code strings.
///
/// Letters are stored uppercase; lookups are case-insensitive.
const MORSE_TABLE: &[(char, &str)] = &[
    ('A', ".-"),
    ('B', "-..."),
    ('C', "-.-."),
    ('D', "-.."),
    ('E', "."),
    ('F', "..-."),
    ('G', "--."),
    ('H', "...."),
    ('I', ".."),
    ('J', ".---"),
    ('K', "-.-"),
    ('L', ".-.."),
    ('M', "--"),
    ('N', "-."),
    ('O', "---"),
    ('P', ".--."),
    ('Q', "--.-"),
    ('R', ".-."),
    ('S', "..."),
    ('T', "-"),
    ('U', "..-"),
    ('V', "...-"),
    ('W', ".--"),
    ('X', "-..-"),
    ('Y', "-.--"),
    ('Z', "--.."),
    ('1', ".----"),
    ('2', "..---"),
    ('3', "...--"),
    ('4', "....-"),
    ('5', "....."),
    ('6', "-...."),
    ('7', "--..."),
    ('8', "---.."),
    ('9', "----."),
    ('0', "-----"),
    (',', "--..--"),
    ('.', ".-.-.-"),
    ('?', "..--.."),
    ('\'', ".----."),
    ('!', "-.-.--"),
    ('/', "-..-."),
    ('(', "-.--."),
    (')', "-.--.-"),
    ('&', ".-..."),
    (':', "---..."),
    (';', "-.-.-."),
    ('=', "-...-"),
    ('+', ".-.-."),
    ('-', "-....-"),
    ('_', "..--.-"),
    ('"', ".-..-."),
    ('$', "...-..-"),
    ('@', ".--.-."),
];

/// Look up the Morse code for a character (case-insensitive).
///
/// A space maps to the word separator token. Returns `None` for characters
/// with no table entry.
pub fn encode_char(c: char) -> Option<&'static str> {
    if c == ' ' {
        return Some(WORD_SEPARATOR);
    }
    let upper = c.to_ascii_uppercase();
    MORSE_TABLE
        .iter()
        .find(|(ch, _)| *ch == upper)
        .map(|(_, code)| *code)
}

/// Resolve a Morse code string to a character.
///
/// The word separator resolves to a space. Unmapped codes resolve to
/// [`UNKNOWN_CHAR`]; this never fails.
pub fn decode_code(code: &str) -> char {
    if code == WORD_SEPARATOR {
        return ' ';
    }
    MORSE_TABLE
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(ch, _)| *ch)
        .unwrap_or(UNKNOWN_CHAR)
}

/// Encode text as a Morse code string.
///
/// Character codes are joined with single spaces; input word spaces become
/// the word separator token. Characters without a table entry encode as
/// [`UNKNOWN_CODE`] so the output stays aligned with the input.
pub fn text_to_morse(text: &str) -> String {
    text.chars()
        .map(|c| encode_char(c).unwrap_or(UNKNOWN_CODE))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode a Morse code string to text.
///
/// Splits on the word separator token, then on whitespace within each word
/// segment; each code resolves to one character and words are joined with
/// single spaces.
pub fn morse_to_text(morse: &str) -> String {
    morse
        .split(WORD_SEPARATOR)
        .map(|segment| segment.split_whitespace().map(decode_code).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_char() {
        assert_eq!(encode_char('S'), Some("..."));
        assert_eq!(encode_char('s'), Some("..."));
        assert_eq!(encode_char('0'), Some("-----"));
        assert_eq!(encode_char(' '), Some("/"));
        assert_eq!(encode_char('@'), Some(".--.-."));
        assert_eq!(encode_char('~'), None);
    }

    #[test]
    fn test_decode_code() {
        assert_eq!(decode_code("..."), 'S');
        assert_eq!(decode_code("-----"), '0');
        assert_eq!(decode_code("/"), ' ');
        assert_eq!(decode_code(".-.-.-.-"), '?');
    }

    #[test]
    fn test_text_to_morse() {
        assert_eq!(text_to_morse("SOS"), "... --- ...");
        assert_eq!(text_to_morse("AB C"), ".- -... / -.-.");
    }

    #[test]
    fn test_morse_to_text() {
        assert_eq!(morse_to_text("... --- ..."), "SOS");
        assert_eq!(morse_to_text(".- -... / -.-."), "AB C");
    }

    #[test]
    fn test_round_trip() {
        let text = "HELLO WORLD 123";
        assert_eq!(morse_to_text(&text_to_morse(text)), text);
    }

    #[test]
    fn test_round_trip_case_normalized() {
        assert_eq!(morse_to_text(&text_to_morse("cq dx")), "CQ DX");
    }

    #[test]
    fn test_unknown_char_encodes_visibly() {
        // Unmapped characters must not vanish from the output
        assert_eq!(text_to_morse("~"), UNKNOWN_CODE);
        assert_eq!(morse_to_text(&text_to_morse("A~B")), "A?B");
    }

    #[test]
    fn test_unknown_code_does_not_truncate() {
        assert_eq!(morse_to_text("... .-.-.-.- ..."), "S?S");
    }
}
