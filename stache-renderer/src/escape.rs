//! HTML escaping for `{{name}}` output.

use std::io::{self, Write};

/// Wraps a `Write` and replaces markup-unsafe characters as bytes pass
/// through. Escapes: `&` `<` `>` `"` `'`
pub struct EscapingWriter<'a> {
    inner: &'a mut dyn Write,
}

impl<'a> EscapingWriter<'a> {
    pub fn new(inner: &'a mut dyn Write) -> Self {
        Self { inner }
    }
}

fn entity(b: u8) -> Option<&'static [u8]> {
    match b {
        b'&' => Some(b"&amp;"),
        b'<' => Some(b"&lt;"),
        b'>' => Some(b"&gt;"),
        b'"' => Some(b"&quot;"),
        b'\'' => Some(b"&#39;"),
        _ => None,
    }
}

impl Write for EscapingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut start = 0;
        for (i, &b) in buf.iter().enumerate() {
            if let Some(replacement) = entity(b) {
                self.inner.write_all(&buf[start..i])?;
                self.inner.write_all(replacement)?;
                start = i + 1;
            }
        }
        self.inner.write_all(&buf[start..])?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Escape `text` into a new string.
pub fn escape_html(text: &str) -> String {
    let mut out = Vec::with_capacity(text.len());
    // Writing into a Vec cannot fail.
    let _ = EscapingWriter::new(&mut out).write_all(text.as_bytes());
    // Only ASCII bytes are replaced, so the output stays valid UTF-8.
    String::from_utf8(out).unwrap_or_default()
}
