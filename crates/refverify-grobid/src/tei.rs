//! Parser for GROBID TEI reference output.
//!
//! `processReferences` returns a TEI document with one `biblStruct` per
//! bibliography entry:
//! ```xml
//! <biblStruct>
//!   <analytic>
//!     <title level="a" type="main">Attention Is All You Need</title>
//!     <author><persName><forename>Ashish</forename><surname>Vaswani</surname></persName></author>
//!   </analytic>
//!   <monogr>
//!     <title level="m">Advances in Neural Information Processing Systems</title>
//!     <imprint><date type="published" when="2017" /></imprint>
//!   </monogr>
//!   <note type="raw_reference">[1] A. Vaswani et al. ...</note>
//! </biblStruct>
//! ```

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::io::BufRead;

use refverify_core::Reference;

/// Parse a TEI document, returning one [`Reference`] per `biblStruct`.
///
/// The article-level (`analytic`) title is preferred; container-only
/// entries (books, whole proceedings) fall back to the `monogr` title.
/// Entries without any title are kept with an empty title so the
/// downstream classifier can account for them.
pub fn parse_references<R: BufRead>(reader: R) -> Vec<Reference> {
    let mut xml_reader = Reader::from_reader(reader);
    xml_reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut references = Vec::new();

    // Current biblStruct state
    let mut in_bibl = false;
    let mut in_analytic = false;
    let mut analytic_title = String::new();
    let mut monogr_title = String::new();
    let mut authors: Vec<String> = Vec::new();
    let mut forename = String::new();
    let mut surname = String::new();
    let mut year: Option<u16> = None;
    let mut raw_citation = String::new();

    // Nesting tracking
    let mut in_title = false;
    let mut in_author = false;
    let mut in_forename = false;
    let mut in_surname = false;
    let mut in_raw_note = false;

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();

                match tag.as_str() {
                    "biblStruct" => {
                        in_bibl = true;
                        analytic_title.clear();
                        monogr_title.clear();
                        authors.clear();
                        year = None;
                        raw_citation.clear();
                    }
                    "analytic" if in_bibl => {
                        in_analytic = true;
                    }
                    "title" if in_bibl => {
                        in_title = true;
                        if in_analytic {
                            analytic_title.clear();
                        } else {
                            monogr_title.clear();
                        }
                    }
                    "author" if in_bibl => {
                        in_author = true;
                    }
                    "forename" if in_author => {
                        in_forename = true;
                        forename.clear();
                    }
                    "surname" if in_author => {
                        in_surname = true;
                        surname.clear();
                    }
                    "date" if in_bibl => {
                        if year.is_none() {
                            year = year_from_when(e);
                        }
                    }
                    "note" if in_bibl => {
                        in_raw_note = e.attributes().flatten().any(|attr| {
                            attr.key.as_ref() == b"type" && attr.value.as_ref() == b"raw_reference"
                        });
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => {
                // GROBID emits dates as self-closing tags.
                if in_bibl && e.name().as_ref() == b"date" && year.is_none() {
                    year = year_from_when(e);
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default();
                if in_title {
                    if in_analytic {
                        analytic_title.push_str(&text);
                    } else {
                        monogr_title.push_str(&text);
                    }
                } else if in_forename {
                    forename.push_str(&text);
                } else if in_surname {
                    surname.push_str(&text);
                } else if in_raw_note {
                    raw_citation.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();

                match tag.as_str() {
                    "analytic" => {
                        in_analytic = false;
                    }
                    "title" => {
                        in_title = false;
                    }
                    "forename" => {
                        in_forename = false;
                    }
                    "surname" => {
                        in_surname = false;
                    }
                    "author" if in_author => {
                        in_author = false;
                        let name = if !forename.is_empty() && !surname.is_empty() {
                            format!("{} {}", forename.trim(), surname.trim())
                        } else if !surname.is_empty() {
                            surname.trim().to_string()
                        } else {
                            forename.trim().to_string()
                        };
                        if !name.is_empty() {
                            authors.push(name);
                        }
                        forename.clear();
                        surname.clear();
                    }
                    "note" => {
                        in_raw_note = false;
                    }
                    "biblStruct" if in_bibl => {
                        in_bibl = false;

                        let title = if !analytic_title.is_empty() {
                            analytic_title.trim().to_string()
                        } else {
                            monogr_title.trim().to_string()
                        };

                        references.push(Reference {
                            raw_title: title,
                            authors: authors.clone(),
                            year,
                            number: references.len() + 1,
                            raw_citation: if raw_citation.is_empty() {
                                None
                            } else {
                                Some(raw_citation.trim().to_string())
                            },
                        });
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    references
}

/// Extract the year from a `when` attribute ("2017", "2017-06", ...).
fn year_from_when(e: &BytesStart) -> Option<u16> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == b"when" {
            let value = String::from_utf8_lossy(&attr.value).to_string();
            return value.get(..4).and_then(|y| y.parse::<u16>().ok());
        }
    }
    None
}
