// src/source/svn_xml.rs
//
// Namespace-agnostic reader for Subversion log XML. Handles both the
// `svn log --xml --verbose` layout and WebDAV `log-report` responses by
// matching on local element names only.

use crate::error::SourceError;
use crate::model::{ChangedPath, PathAction, Revision, RevisionRecord};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug, Default)]
struct EntryBuilder {
    revision: Option<Revision>,
    author: Option<String>,
    date: Option<String>,
    message: Option<String>,
    paths: Vec<ChangedPath>,
}

impl EntryBuilder {
    fn finish(self) -> Option<RevisionRecord> {
        Some(RevisionRecord {
            revision: self.revision?,
            author: self.author.unwrap_or_else(|| "Unknown".to_string()),
            date: self.date,
            message: self.message.unwrap_or_default(),
            paths: self.paths,
        })
    }
}

#[derive(Debug)]
enum Field {
    Revision,
    Author,
    Date,
    Message,
    Path {
        action: PathAction,
        copy_from_path: Option<String>,
        copy_from_rev: Option<Revision>,
    },
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn is_entry(name: &str) -> bool {
    name == "logentry" || name == "log-entry" || name == "log-item"
}

fn xml_err(err: impl std::fmt::Display) -> SourceError {
    SourceError::Xml(err.to_string())
}

fn attributes(start: &BytesStart<'_>) -> Result<Vec<(String, String)>, SourceError> {
    start
        .attributes()
        .map(|attr| {
            let attr = attr.map_err(xml_err)?;
            let key = local_name(attr.key.local_name().as_ref());
            let value = attr.unescape_value().map_err(xml_err)?.into_owned();
            Ok((key, value))
        })
        .collect()
}

fn attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// `<path action="..">`, or a WebDAV `<S:added-path>`-style element whose
/// action is spelled in its name. Both carry the same copy-from attributes.
fn path_field(start: &BytesStart<'_>, named_action: Option<&str>) -> Result<Field, SourceError> {
    let attrs = attributes(start)?;
    let action = named_action.or_else(|| attr(&attrs, "action")).unwrap_or("M");
    Ok(Field::Path {
        action: PathAction::from_tag(action),
        copy_from_path: attr(&attrs, "copyfrom-path").map(str::to_string),
        copy_from_rev: attr(&attrs, "copyfrom-rev").and_then(|v| v.trim().parse().ok()),
    })
}

fn classify(name: &str, start: &BytesStart<'_>) -> Result<Option<Field>, SourceError> {
    let field = match name {
        "version-name" => Field::Revision,
        "author" | "creator-displayname" => Field::Author,
        "date" => Field::Date,
        "msg" | "comment" => Field::Message,
        "path" => path_field(start, None)?,
        other => match other.strip_suffix("-path") {
            Some(kind) => path_field(start, Some(kind))?,
            None => return Ok(None),
        },
    };
    Ok(Some(field))
}

/// Parses every log entry in `xml`, in document order. Entries without a
/// numeric revision are dropped.
pub fn parse_log_xml(xml: &str) -> Result<Vec<RevisionRecord>, SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut entry: Option<EntryBuilder> = None;
    let mut field: Option<(String, Field)> = None;
    let mut text = String::new();

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(start) => {
                let name = local_name(start.local_name().as_ref());
                if is_entry(&name) {
                    let attrs = attributes(&start)?;
                    entry = Some(EntryBuilder {
                        revision: attr(&attrs, "revision").and_then(|v| v.trim().parse().ok()),
                        ..EntryBuilder::default()
                    });
                } else if entry.is_some() {
                    if let Some(kind) = classify(&name, &start)? {
                        field = Some((name, kind));
                        text.clear();
                    }
                }
            }
            Event::Text(t) => {
                if field.is_some() {
                    text.push_str(&t.unescape().map_err(xml_err)?);
                }
            }
            Event::CData(data) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::End(end) => {
                let name = local_name(end.local_name().as_ref());
                if is_entry(&name) {
                    if let Some(record) = entry.take().and_then(EntryBuilder::finish) {
                        records.push(record);
                    }
                    field = None;
                    continue;
                }
                let closes_field = matches!(&field, Some((open, _)) if *open == name);
                if !closes_field {
                    continue;
                }
                if let (Some((_, kind)), Some(builder)) = (field.take(), entry.as_mut()) {
                    apply(builder, kind, text.trim());
                }
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(records)
}

fn apply(builder: &mut EntryBuilder, field: Field, value: &str) {
    match field {
        Field::Revision => {
            if builder.revision.is_none() {
                builder.revision = value.parse().ok();
            }
        }
        Field::Author => builder.author = Some(value.to_string()),
        Field::Date => builder.date = Some(value.to_string()),
        Field::Message => builder.message = Some(value.to_string()),
        Field::Path { action, copy_from_path, copy_from_rev } => {
            if !value.is_empty() {
                builder.paths.push(ChangedPath {
                    action,
                    path: value.to_string(),
                    copy_from_path,
                    copy_from_rev,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CLI_LOG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<log>
<logentry revision="1202">
<author>alice</author>
<date>2024-03-01T10:00:00.000000Z</date>
<paths>
<path action="M" prop-mods="false" text-mods="true" kind="file">/trunk/src/main.c</path>
<path action="A" kind="dir" copyfrom-path="/trunk" copyfrom-rev="1200">/branches/feature</path>
</paths>
<msg>Fix &amp; branch</msg>
</logentry>
<logentry revision="1201">
<date>2024-02-28T09:00:00.000000Z</date>
<msg></msg>
</logentry>
</log>
"#;

    const DAV_REPORT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<S:log-report xmlns:S="svn:" xmlns:D="DAV:">
<S:log-item>
<D:version-name>77</D:version-name>
<D:creator-displayname>bob</D:creator-displayname>
<S:date>2023-11-05T08:30:00.000000Z</S:date>
<D:comment>Rename module</D:comment>
<S:added-path copyfrom-path="/trunk/old.rs" copyfrom-rev="76">/trunk/new.rs</S:added-path>
<S:deleted-path>/trunk/old.rs</S:deleted-path>
<S:modified-path node-kind="file">/trunk/lib.rs</S:modified-path>
</S:log-item>
<S:log-item>
<D:comment>no revision, skipped</D:comment>
</S:log-item>
</S:log-report>
"#;

    #[test]
    fn parses_cli_verbose_log() {
        let records = parse_log_xml(CLI_LOG).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.revision, 1202);
        assert_eq!(first.author, "alice");
        assert_eq!(first.date.as_deref(), Some("2024-03-01T10:00:00.000000Z"));
        assert_eq!(first.message, "Fix & branch");
        assert_eq!(
            first.paths,
            vec![
                ChangedPath {
                    action: PathAction::Modified,
                    path: "/trunk/src/main.c".to_string(),
                    copy_from_path: None,
                    copy_from_rev: None,
                },
                ChangedPath {
                    action: PathAction::Added,
                    path: "/branches/feature".to_string(),
                    copy_from_path: Some("/trunk".to_string()),
                    copy_from_rev: Some(1200),
                },
            ]
        );

        let second = &records[1];
        assert_eq!(second.revision, 1201);
        assert_eq!(second.author, "Unknown");
        assert_eq!(second.message, "");
        assert!(second.paths.is_empty());
    }

    #[test]
    fn parses_dav_log_report() {
        let records = parse_log_xml(DAV_REPORT).unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.revision, 77);
        assert_eq!(record.author, "bob");
        assert_eq!(record.message, "Rename module");
        let actions: Vec<_> = record.paths.iter().map(|p| (p.action.as_tag(), p.path.as_str())).collect();
        assert_eq!(
            actions,
            vec![("A", "/trunk/new.rs"), ("D", "/trunk/old.rs"), ("M", "/trunk/lib.rs")]
        );
        assert_eq!(record.paths[0].copy_from_rev, Some(76));
    }

    #[test]
    fn empty_log_yields_nothing() {
        assert!(parse_log_xml("<?xml version=\"1.0\"?><log></log>").unwrap().is_empty());
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(matches!(parse_log_xml("<log><logentry revision=\"1\"></log>"), Err(SourceError::Xml(_))));
    }
}
