use std::collections::VecDeque;

/// 인자 문자열을 구분자 단위로 잘라낸다.
///
/// 마지막 토큰을 돌려준 뒤에는 `None`만 돌려준다. 빈 토큰(`a,,b`의 가운데)은
/// 빈 문자열로 나온다.
pub struct Lexer {
    src: VecDeque<char>,
    exhausted: bool,
}

impl Lexer {
    pub fn new(src: &str) -> Self {
        Lexer {
            src: src.chars().collect(),
            exhausted: false,
        }
    }

    pub fn finished(&self) -> bool {
        self.exhausted
    }

    fn walk(&mut self) -> Option<char> {
        self.src.pop_front()
    }

    pub fn next_comma(&mut self) -> Option<String> {
        self.next(',')
    }

    pub fn next_period(&mut self) -> Option<String> {
        self.next('.')
    }

    fn next(&mut self, delim: char) -> Option<String> {
        if self.exhausted {
            return None;
        }
        let mut out = String::new();
        loop {
            match self.walk() {
                Some(ch) if ch == delim => break,
                Some(ch) => out.push(ch),
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }
        Some(out.trim().to_string())
    }
}

/// 모든 `"` 문자를 지운다. 양 끝 한 쌍만 지우는 것이 아니다.
pub fn trim_quotes(src: &str) -> String {
    src.chars().filter(|&ch| ch != '"').collect()
}

/// 끝의 `)` 하나를 떼어낸다. 없으면 `None`.
pub fn strip_close_paren(src: &str) -> Option<&str> {
    src.strip_suffix(')').map(str::trim_end)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_comma_tokens() {
        let mut lexer = Lexer::new("\"grades\",db1,2)");
        assert_eq!(lexer.next_comma(), Some("\"grades\"".to_string()));
        assert_eq!(lexer.next_comma(), Some("db1".to_string()));
        assert!(!lexer.finished());
        assert_eq!(lexer.next_comma(), Some("2)".to_string()));
        assert!(lexer.finished());
        assert_eq!(lexer.next_comma(), None);
    }

    #[test]
    fn test_period_tokens() {
        let mut lexer = Lexer::new("db1.tbl1.col1");
        assert_eq!(lexer.next_period(), Some("db1".to_string()));
        assert_eq!(lexer.next_period(), Some("tbl1".to_string()));
        assert_eq!(lexer.next_period(), Some("col1".to_string()));
        assert_eq!(lexer.next_period(), None);
    }

    #[test]
    fn test_empty_tokens() {
        let mut lexer = Lexer::new("a,,b");
        assert_eq!(lexer.next_comma(), Some("a".to_string()));
        assert_eq!(lexer.next_comma(), Some("".to_string()));
        assert_eq!(lexer.next_comma(), Some("b".to_string()));
        assert_eq!(lexer.next_comma(), None);

        let mut lexer = Lexer::new("");
        assert_eq!(lexer.next_comma(), Some("".to_string()));
        assert_eq!(lexer.next_comma(), None);
    }

    #[test]
    fn test_tokens_are_trimmed() {
        let mut lexer = Lexer::new(" \"t\" ,  db1 ");
        assert_eq!(lexer.next_comma(), Some("\"t\"".to_string()));
        assert_eq!(lexer.next_comma(), Some("db1".to_string()));
    }

    #[test]
    fn test_trim_quotes_removes_every_quote() {
        assert_eq!(trim_quotes("\"db1\""), "db1");
        assert_eq!(trim_quotes("\"d\"b\"1\")"), "db1)");
        assert_eq!(trim_quotes("plain"), "plain");
    }

    #[test]
    fn test_strip_close_paren() {
        assert_eq!(strip_close_paren("db1)"), Some("db1"));
        assert_eq!(strip_close_paren(")"), Some(""));
        assert_eq!(strip_close_paren("db1"), None);
        assert_eq!(strip_close_paren(""), None);
    }
}
