mod expand;
mod target_error;

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

pub use crate::target_error::TargetError;

pub type Result<T> = std::result::Result<T, TargetError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl TryFrom<&str> for Method {
    type Error = String;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            other => Err(format!("unknown method `{other}`")),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        };
        name.fmt(f)
    }
}

/// One request to issue, fixed at parse time.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    pub method: Method,
    pub url: String,
    pub body: Vec<u8>,
}

/// The immutable request corpus plus the round-robin cursor over it.
///
/// Targets file syntax, one entry per block:
///
/// ```text
/// GET <url>
/// $ <body>
/// ```
///
/// The body line is optional; `{}` stands for an explicitly empty body. URLs
/// may use the bracket template language (see [`TargetSet::from_reader`]'s
/// module) and expand into several requests.
#[derive(Debug)]
pub struct TargetSet {
    requests: Vec<RequestTemplate>,
    headers: Vec<(String, String)>,
    cursor: AtomicUsize,
}

impl TargetSet {
    pub fn from_path(path: impl AsRef<Path>, base64_body: bool) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), base64_body)
    }

    pub fn from_reader(reader: impl BufRead, base64_body: bool) -> Result<Self> {
        let requests = parse_targets(reader, base64_body)?;
        if requests.is_empty() {
            return Err(TargetError::EmptyCorpus);
        }
        Ok(Self {
            requests,
            headers: Vec::new(),
            cursor: AtomicUsize::new(0),
        })
    }

    /// Fixed headers set on every request of the run.
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Next template, round-robin. Never blocks; the cursor advances with a
    /// single atomic add.
    pub fn next(&self) -> &RequestTemplate {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed);
        &self.requests[idx % self.requests.len()]
    }
}

/// Splits a `-H "Key: value"` flag into its pair.
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once(':')
        .ok_or_else(|| TargetError::Header(raw.to_string()))?;
    Ok((key.trim().to_string(), value.trim().to_string()))
}

fn parse_targets(reader: impl BufRead, base64_body: bool) -> Result<Vec<RequestTemplate>> {
    let mut requests = Vec::new();
    let mut lines = reader.lines().enumerate();
    let mut pushed_back: Option<(usize, String)> = None;

    loop {
        let (line_no, line) = match pushed_back.take() {
            Some(entry) => entry,
            None => match lines.next() {
                Some((idx, line)) => (idx + 1, line?.trim().to_string()),
                None => break,
            },
        };
        if line.is_empty() {
            continue;
        }

        let Some((method_raw, url_raw)) = line.split_once(char::is_whitespace) else {
            return Err(TargetError::Syntax {
                line: line_no,
                message: format!("expected `METHOD url`, got `{line}`"),
            });
        };
        let method = Method::try_from(method_raw.trim()).map_err(|message| TargetError::Syntax {
            line: line_no,
            message,
        })?;
        let url_raw = url_raw.trim();

        let mut body: Vec<u8> = Vec::new();
        if let Some((idx, next)) = lines.next() {
            let next = next?.trim().to_string();
            if next == "{}" {
                // explicitly empty body
            } else if let Some(raw) = next.strip_prefix("$ ") {
                body = if base64_body {
                    BASE64.decode(raw).map_err(|err| TargetError::Syntax {
                        line: idx + 1,
                        message: format!("bad base64 body: {err}"),
                    })?
                } else {
                    raw.as_bytes().to_vec()
                };
            } else {
                // not a body line; hand it to the next entry
                pushed_back = Some((idx + 1, next));
            }
        }

        for url in expand::expand_url(url_raw)? {
            requests.push(RequestTemplate {
                method,
                url,
                body: body.clone(),
            });
        }
    }

    Ok(requests)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_parses_methods_bodies_and_separators() {
        let input = "\
GET http://localhost/a

POST http://localhost/b
$ {\"qty\": 1}
PUT http://localhost/c
{}
DELETE http://localhost/d
";
        let set = TargetSet::from_reader(input.as_bytes(), false).unwrap();
        assert_eq!(set.len(), 4);

        let methods: Vec<Method> = set.requests.iter().map(|t| t.method).collect();
        assert_eq!(
            methods,
            vec![Method::Get, Method::Post, Method::Put, Method::Delete]
        );
        assert_eq!(set.requests[0].body, b"");
        assert_eq!(set.requests[1].body, br#"{"qty": 1}"#);
        assert_eq!(set.requests[2].body, b"");
    }

    #[test]
    fn it_expands_ranged_urls_in_order() {
        let set =
            TargetSet::from_reader("GET http://localhost/items/[1-3]\n".as_bytes(), false).unwrap();
        let urls: Vec<&str> = set.requests.iter().map(|t| t.url.as_str()).collect();
        insta::assert_debug_snapshot!(urls, @r#"
        [
            "http://localhost/items/1",
            "http://localhost/items/2",
            "http://localhost/items/3",
        ]
        "#);
    }

    #[test]
    fn it_decodes_base64_bodies_when_asked() {
        let input = "POST http://localhost/enc\n$ aGVsbG8=\n";
        let set = TargetSet::from_reader(input.as_bytes(), true).unwrap();
        assert_eq!(set.requests[0].body, b"hello");
    }

    #[test]
    fn it_rejects_a_broken_base64_body() {
        let input = "POST http://localhost/enc\n$ not-base64!\n";
        let err = TargetSet::from_reader(input.as_bytes(), true).unwrap_err();
        assert!(matches!(err, TargetError::Syntax { line: 2, .. }));
    }

    #[test]
    fn it_rejects_an_empty_corpus() {
        let err = TargetSet::from_reader("\n\n".as_bytes(), false).unwrap_err();
        assert!(matches!(err, TargetError::EmptyCorpus));
    }

    #[test]
    fn it_rejects_an_unknown_method() {
        let err = TargetSet::from_reader("GIMME http://localhost/a\n".as_bytes(), false).unwrap_err();
        assert!(matches!(err, TargetError::Syntax { line: 1, .. }));
    }

    #[test]
    fn it_cycles_round_robin_exactly_once_per_lap() {
        let input = "GET http://h/a\nGET http://h/b\nGET http://h/c\n";
        let set = TargetSet::from_reader(input.as_bytes(), false).unwrap();

        let lap1: Vec<String> = (0..3).map(|_| set.next().url.clone()).collect();
        let lap2: Vec<String> = (0..3).map(|_| set.next().url.clone()).collect();
        assert_eq!(lap1, ["http://h/a", "http://h/b", "http://h/c"]);
        assert_eq!(lap1, lap2);
    }

    #[test]
    fn it_splits_header_flags() {
        let (key, value) = parse_header("X-Token: abc 123").unwrap();
        assert_eq!(key, "X-Token");
        assert_eq!(value, "abc 123");

        let err = parse_header("no-colon-here").unwrap_err();
        assert!(matches!(err, TargetError::Header(_)));
    }
}
