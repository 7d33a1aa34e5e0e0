use chrono::Local;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::error::{BookmarkError, Result};
use crate::model::{BookmarkNode, BookmarkTree, Origin, Side};
use crate::utils::generate_id;

/// Microseconds between 1601-01-01 (Chrome's epoch) and the Unix epoch.
pub const CHROME_EPOCH_OFFSET_MICROS: i64 = 11_644_473_600_000_000;

const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BookmarkFileFormat {
    ChromeHtml,
    FirefoxHtml,
    ChromeJson,
    GenericJson,
}

impl BookmarkFileFormat {
    pub fn is_html(self) -> bool {
        matches!(self, BookmarkFileFormat::ChromeHtml | BookmarkFileFormat::FirefoxHtml)
    }

    pub fn extension(self) -> &'static str {
        if self.is_html() {
            "html"
        } else {
            "json"
        }
    }
}

impl fmt::Display for BookmarkFileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BookmarkFileFormat::ChromeHtml => "chrome-html",
            BookmarkFileFormat::FirefoxHtml => "firefox-html",
            BookmarkFileFormat::ChromeJson => "chrome-json",
            BookmarkFileFormat::GenericJson => "generic-json",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub origin: Origin,
    pub root_id: Option<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            origin: Origin::Left,
            root_id: None,
        }
    }
}

impl ParseOptions {
    pub fn for_side(side: Side) -> Self {
        Self {
            origin: side.into(),
            root_id: Some(format!("{}-import-{}", side, Local::now().timestamp_millis())),
        }
    }

    fn root_id(&self) -> String {
        self.root_id.clone().unwrap_or_else(|| generate_id("root"))
    }
}

fn json_format(content: &str) -> BookmarkFileFormat {
    if content.contains("\"roots\"") {
        BookmarkFileFormat::ChromeJson
    } else {
        BookmarkFileFormat::GenericJson
    }
}

fn html_format(content: &str) -> BookmarkFileFormat {
    if content.contains("Mozilla Firefox") {
        BookmarkFileFormat::FirefoxHtml
    } else {
        BookmarkFileFormat::ChromeHtml
    }
}

/// Picks a format from the file extension, falling back to the content.
pub fn detect_format(file_name: &str, content: &str) -> Result<BookmarkFileFormat> {
    let name = file_name.to_lowercase();
    if name.ends_with(".html") || name.ends_with(".htm") {
        return Ok(html_format(content));
    }
    if name.ends_with(".json") {
        return Ok(json_format(content));
    }

    let trimmed = content.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(json_format(content));
    }
    let upper = trimmed.to_uppercase();
    if upper.starts_with("<!DOCTYPE NETSCAPE") || upper.contains("<DL") {
        return Ok(html_format(content));
    }

    Err(BookmarkError::UnsupportedFormat(file_name.to_string()))
}

pub fn parse(
    content: &str,
    format: BookmarkFileFormat,
    options: &ParseOptions,
) -> Result<BookmarkTree> {
    if format.is_html() {
        parse_html(content, options)
    } else {
        parse_json(content, options)
    }
}

/// Reads a bookmark file and tags every node with `side`.
pub fn load_tree(path: &Path, side: Side) -> Result<BookmarkTree> {
    load_tree_with_format(path, side).map(|(tree, _)| tree)
}

/// Like [`load_tree`], also returning the detected format so the tree can be
/// written back the same way.
pub fn load_tree_with_format(
    path: &Path,
    side: Side,
) -> Result<(BookmarkTree, BookmarkFileFormat)> {
    let content = std::fs::read_to_string(path)?;
    let file_name = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let format = detect_format(&file_name, &content)?;
    debug!(file = %path.display(), format = %format, "Importing bookmarks");

    let tree = parse(&content, format, &ParseOptions::for_side(side))?;
    info!(
        file = %path.display(),
        side = %side,
        nodes = tree.node_count(),
        "Bookmarks imported"
    );
    Ok((tree, format))
}

fn title_or_untitled(raw: &str) -> String {
    let title = raw.trim();
    if title.is_empty() {
        UNTITLED.to_string()
    } else {
        title.to_string()
    }
}

// ---------------------------------------------------------------------------
// Netscape HTML

fn folder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<DT><H3([^>]*)>(.*?)</H3>").expect("valid folder regex"))
}

fn link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<DT><A\s+([^>]*)>(.*?)</A>").expect("valid link regex"))
}

fn attribute_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)([A-Z_:-]+)\s*=\s*"([^"]*)""#).expect("valid attribute regex")
    })
}

fn entity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&(#[xX]?[0-9a-fA-F]+|[a-zA-Z]+);").expect("valid entity regex"))
}

pub fn decode_html_entities(value: &str) -> String {
    entity_regex()
        .replace_all(value, |caps: &regex::Captures<'_>| {
            let entity = &caps[1];
            if let Some(numeric) = entity.strip_prefix('#') {
                let code = match numeric.strip_prefix(['x', 'X']) {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => numeric.parse::<u32>().ok(),
                };
                return code.and_then(char::from_u32).map(String::from).unwrap_or_default();
            }
            match entity {
                "amp" => "&",
                "lt" => "<",
                "gt" => ">",
                "quot" => "\"",
                "apos" => "'",
                "nbsp" => " ",
                _ => "",
            }
            .to_string()
        })
        .into_owned()
}

fn parse_attributes(raw: &str) -> Map<String, Value> {
    attribute_regex()
        .captures_iter(raw)
        .map(|caps| (caps[1].to_lowercase(), Value::String(caps[2].to_string())))
        .collect()
}

fn attr<'a>(attrs: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    attrs.get(key).and_then(Value::as_str)
}

/// `ADD_DATE` style values: seconds, milliseconds or microseconds.
fn parse_timestamp(value: Option<&str>) -> Option<i64> {
    let numeric: i64 = value?.trim().parse().ok()?;
    if numeric <= 0 {
        None
    } else if numeric > 1_000_000_000_000_000 {
        Some(numeric / 1000)
    } else if numeric > 1_000_000_000_000 {
        Some(numeric)
    } else {
        Some(numeric * 1000)
    }
}

#[derive(Clone, Copy)]
enum LastNode {
    None,
    OpenFolder,
    Child,
}

fn attach(node: BookmarkNode, stack: &mut [BookmarkNode], roots: &mut Vec<BookmarkNode>) {
    match stack.last_mut() {
        Some(parent) => parent.children.get_or_insert_with(Vec::new).push(node),
        None => roots.push(node),
    }
}

fn last_node<'a>(
    last: LastNode,
    stack: &'a mut [BookmarkNode],
    roots: &'a mut [BookmarkNode],
) -> Option<&'a mut BookmarkNode> {
    match last {
        LastNode::None => None,
        LastNode::OpenFolder => stack.last_mut(),
        LastNode::Child => match stack.last_mut() {
            Some(parent) => parent.children.as_mut()?.last_mut(),
            None => roots.last_mut(),
        },
    }
}

/// Line-based parser for the Netscape bookmark format exported by Chrome,
/// Firefox and most other browsers.
pub fn parse_html(content: &str, options: &ParseOptions) -> Result<BookmarkTree> {
    let origin = options.origin;
    let mut roots: Vec<BookmarkNode> = Vec::new();
    let mut stack: Vec<BookmarkNode> = Vec::new();
    let mut last = LastNode::None;

    for raw_line in content.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let upper = line.to_uppercase();
        if upper.starts_with("<!") || upper.starts_with("<META") || upper.starts_with("<TITLE") {
            continue;
        }

        if upper.starts_with("</DL") {
            if let Some(folder) = stack.pop() {
                attach(folder, &mut stack, &mut roots);
                last = LastNode::Child;
            }
            continue;
        }

        if upper.starts_with("<DL") {
            continue;
        }

        let parent_path = stack.last().map(|f| f.path.clone()).unwrap_or_default();

        if let Some(caps) = folder_regex().captures(line) {
            let attrs = parse_attributes(&caps[1]);
            let title = title_or_untitled(&decode_html_entities(&caps[2]));
            let id = attr(&attrs, "id")
                .map(str::to_string)
                .unwrap_or_else(|| generate_id("fld"));
            let mut folder = BookmarkNode::folder(id, title, &parent_path, origin);
            folder.created_at = parse_timestamp(attr(&attrs, "add_date"))
                .or_else(|| parse_timestamp(attr(&attrs, "last_modified")));
            stack.push(folder);
            last = LastNode::OpenFolder;
            continue;
        }

        if let Some(caps) = link_regex().captures(line) {
            let attrs = parse_attributes(&caps[1]);
            let title = title_or_untitled(&decode_html_entities(&caps[2]));
            let id = attr(&attrs, "id")
                .map(str::to_string)
                .unwrap_or_else(|| generate_id("url"));
            let url = decode_html_entities(attr(&attrs, "href").unwrap_or(""));
            let mut bookmark = BookmarkNode::bookmark(id, title, url, &parent_path, origin);
            bookmark.created_at = parse_timestamp(attr(&attrs, "add_date"));
            bookmark.icon = attr(&attrs, "icon")
                .or_else(|| attr(&attrs, "icon_uri"))
                .map(str::to_string);
            attach(bookmark, &mut stack, &mut roots);
            last = LastNode::Child;
            continue;
        }

        if upper.starts_with("<DD>") {
            let description = decode_html_entities(line[4..].trim());
            if let Some(node) = last_node(last, &mut stack, &mut roots) {
                node.description = Some(description);
            }
        }
    }

    // Unterminated folders still belong to the tree.
    if !stack.is_empty() {
        warn!(open = stack.len(), "Bookmark HTML ended with unclosed folders");
    }
    while let Some(folder) = stack.pop() {
        attach(folder, &mut stack, &mut roots);
    }

    Ok(BookmarkTree::new(options.root_id(), origin, roots))
}

// ---------------------------------------------------------------------------
// JSON

fn as_number(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn from_chrome_epoch(value: Option<&Value>) -> Option<i64> {
    let micros = as_number(value)?;
    if micros <= 0 {
        None
    } else if micros > CHROME_EPOCH_OFFSET_MICROS {
        Some((micros - CHROME_EPOCH_OFFSET_MICROS) / 1000)
    } else if micros > 1_000_000_000_000 {
        Some(micros)
    } else {
        Some(micros * 1000)
    }
}

fn string_field<'a>(raw: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    raw.get(key).and_then(Value::as_str)
}

fn build_node(raw: &Map<String, Value>, parent_path: &[String], origin: Origin) -> BookmarkNode {
    let title = title_or_untitled(
        string_field(raw, "name")
            .or_else(|| string_field(raw, "title"))
            .unwrap_or(""),
    );
    let is_folder = string_field(raw, "type").is_some_and(|t| t.eq_ignore_ascii_case("folder"))
        || raw.get("children").is_some_and(Value::is_array);

    let id = match raw.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => string_field(raw, "guid")
            .map(str::to_string)
            .unwrap_or_else(|| generate_id(if is_folder { "fld" } else { "url" })),
    };

    let mut node = if is_folder {
        BookmarkNode::folder(id, title, parent_path, origin)
    } else {
        let url = string_field(raw, "url")
            .or_else(|| string_field(raw, "uri"))
            .unwrap_or("");
        BookmarkNode::bookmark(id, title, url, parent_path, origin)
    };

    node.created_at = from_chrome_epoch(raw.get("date_added"))
        .or_else(|| from_chrome_epoch(raw.get("dateAdded")))
        .or_else(|| from_chrome_epoch(raw.get("createdAt")))
        .or_else(|| from_chrome_epoch(raw.get("add_date")))
        .or_else(|| as_number(raw.get("last_modified")));
    node.description = string_field(raw, "description").map(str::to_string);
    node.icon = string_field(raw, "icon").map(str::to_string);

    if is_folder {
        let children = build_children(raw.get("children"), &node.path, origin);
        node.children = Some(children);
    }
    node
}

fn build_children(
    raw: Option<&Value>,
    parent_path: &[String],
    origin: Origin,
) -> Vec<BookmarkNode> {
    let Some(Value::Array(entries)) = raw else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::Object(map) => Some(build_node(map, parent_path, origin)),
            other => {
                warn!(entry = %other, "Skipping non-object bookmark entry");
                None
            }
        })
        .collect()
}

/// Accepts a bare array of nodes, a Chrome `Bookmarks` file (`roots`), or a
/// single root object whose children become the top level.
pub fn parse_json(content: &str, options: &ParseOptions) -> Result<BookmarkTree> {
    let origin = options.origin;
    let payload: Value = serde_json::from_str(content)?;

    let nodes = match &payload {
        Value::Array(_) => build_children(Some(&payload), &[], origin),
        Value::Object(map) => match map.get("roots") {
            Some(Value::Object(roots)) => roots
                .values()
                .filter_map(Value::as_object)
                .map(|root| build_node(root, &[], origin))
                .collect(),
            _ if map.contains_key("children") => {
                let root = build_node(map, &[], origin);
                match root.children {
                    Some(children) => children
                        .into_iter()
                        .map(|mut child| {
                            child.restamp(&[], origin);
                            child
                        })
                        .collect(),
                    None => vec![root],
                }
            }
            _ => {
                return Err(BookmarkError::InvalidStructure(
                    "expected an array, a \"roots\" object or an object with \"children\"".into(),
                ))
            }
        },
        _ => {
            return Err(BookmarkError::InvalidStructure(
                "top-level JSON value is not an array or object".into(),
            ))
        }
    };

    Ok(BookmarkTree::new(options.root_id(), origin, nodes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const NETSCAPE: &str = r#"<!DOCTYPE NETSCAPE-Bookmark-file-1>
<META HTTP-EQUIV="Content-Type" CONTENT="text/html; charset=UTF-8">
<TITLE>Bookmarks</TITLE>
<H1>Bookmarks</H1>
<DL><p>
    <DT><H3 ADD_DATE="1700000000" PERSONAL_TOOLBAR_FOLDER="true">Bookmarks bar</H3>
    <DL><p>
        <DT><A HREF="https://www.rust-lang.org/" ADD_DATE="1700000001" ICON="data:image/png;base64,AAA">Rust &amp; Cargo</A>
        <DD>Systems language
        <DT><H3>Empty</H3>
        <DL><p>
        </DL><p>
    </DL><p>
    <DT><A HREF="https://example.com/?a=1&amp;b=2">&#x41;rchive</A>
</DL><p>
"#;

    fn p(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_netscape_folders_and_links() {
        let tree = parse_html(NETSCAPE, &ParseOptions::for_side(Side::Right)).unwrap();

        assert_eq!(tree.origin, Origin::Right);
        assert_eq!(tree.nodes.len(), 2);

        let bar = &tree.nodes[0];
        assert_eq!(bar.title, "Bookmarks bar");
        assert_eq!(bar.created_at, Some(1_700_000_000_000));
        let children = bar.children.as_ref().unwrap();
        assert_eq!(children.len(), 2);

        let rust = &children[0];
        assert_eq!(rust.title, "Rust & Cargo");
        assert_eq!(rust.url.as_deref(), Some("https://www.rust-lang.org/"));
        assert_eq!(rust.path, p(&["Bookmarks bar", "Rust & Cargo"]));
        assert_eq!(rust.description.as_deref(), Some("Systems language"));
        assert_eq!(rust.icon.as_deref(), Some("data:image/png;base64,AAA"));
        assert_eq!(rust.origin, Origin::Right);

        let empty = &children[1];
        assert_eq!(empty.children, Some(Vec::new()));
        assert_eq!(empty.path, p(&["Bookmarks bar", "Empty"]));

        let archive = &tree.nodes[1];
        assert_eq!(archive.title, "Archive");
        assert_eq!(archive.url.as_deref(), Some("https://example.com/?a=1&b=2"));
        assert_eq!(archive.path, p(&["Archive"]));
    }

    #[test]
    fn generated_ids_are_unique_within_a_tree() {
        let tree = parse_html(NETSCAPE, &ParseOptions::default()).unwrap();
        let mut ids = Vec::new();
        fn collect(nodes: &[BookmarkNode], ids: &mut Vec<String>) {
            for node in nodes {
                ids.push(node.id.clone());
                collect(node.children.as_deref().unwrap_or(&[]), ids);
            }
        }
        collect(&tree.nodes, &mut ids);
        let count = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), count);
    }

    #[test]
    fn parses_chrome_bookmarks_file() {
        let content = r#"{
            "checksum": "",
            "roots": {
                "bookmark_bar": {
                    "id": "1", "name": "Bookmarks bar", "type": "folder",
                    "date_added": "13350000000000000",
                    "children": [
                        { "id": 5, "name": "Crates", "type": "url", "url": "https://crates.io" }
                    ]
                },
                "other": { "id": "2", "name": "Other bookmarks", "type": "folder", "children": [] }
            },
            "version": 1
        }"#;

        let tree = parse_json(content, &ParseOptions::default()).unwrap();

        assert_eq!(tree.nodes.len(), 2);
        let bar = &tree.nodes[0];
        assert_eq!(bar.id, "1");
        assert_eq!(
            bar.created_at,
            Some((13_350_000_000_000_000 - CHROME_EPOCH_OFFSET_MICROS) / 1000)
        );
        let crates = &bar.children.as_ref().unwrap()[0];
        assert_eq!(crates.id, "5");
        assert_eq!(crates.path, p(&["Bookmarks bar", "Crates"]));
        assert_eq!(tree.nodes[1].children, Some(Vec::new()));
    }

    #[test]
    fn single_root_object_exposes_its_children() {
        let content = r#"{ "title": "Root", "children": [
            { "title": "  ", "url": "https://blank.example" },
            { "title": "Docs", "children": [ { "title": "Std", "uri": "https://doc.rust-lang.org/std" } ] }
        ] }"#;

        let tree = parse_json(content, &ParseOptions::default()).unwrap();

        assert_eq!(tree.nodes[0].title, "Untitled");
        assert_eq!(tree.nodes[0].path, p(&["Untitled"]));
        let std = &tree.nodes[1].children.as_ref().unwrap()[0];
        assert_eq!(std.path, p(&["Docs", "Std"]));
        assert_eq!(std.url.as_deref(), Some("https://doc.rust-lang.org/std"));
    }

    #[rstest]
    #[case("42")]
    #[case(r#"{ "name": "no children" }"#)]
    fn unrecognized_json_shapes_are_rejected(#[case] content: &str) {
        let err = parse_json(content, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, BookmarkError::InvalidStructure(_)));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = parse_json("[{", &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, BookmarkError::Parse(_)));
    }

    #[rstest]
    #[case("bookmarks.html", "", BookmarkFileFormat::ChromeHtml)]
    #[case("export.HTM", "<H1>Mozilla Firefox</H1>", BookmarkFileFormat::FirefoxHtml)]
    #[case("Bookmarks.json", r#"{"roots":{}}"#, BookmarkFileFormat::ChromeJson)]
    #[case("Bookmarks", r#"{"roots":{}}"#, BookmarkFileFormat::ChromeJson)]
    #[case("dump", "  [ ]", BookmarkFileFormat::GenericJson)]
    #[case("bookmarks.txt", "<!DOCTYPE NETSCAPE-Bookmark-file-1>", BookmarkFileFormat::ChromeHtml)]
    fn detects_formats(
        #[case] name: &str,
        #[case] content: &str,
        #[case] expected: BookmarkFileFormat,
    ) {
        assert_eq!(detect_format(name, content).unwrap(), expected);
    }

    #[test]
    fn unknown_content_is_unsupported() {
        assert!(matches!(
            detect_format("notes.txt", "just some text"),
            Err(BookmarkError::UnsupportedFormat(_))
        ));
    }

    #[rstest]
    #[case(Some("1700000000"), Some(1_700_000_000_000))]
    #[case(Some("1700000000123"), Some(1_700_000_000_123))]
    #[case(Some("1700000000123456"), Some(1_700_000_000_123))]
    #[case(Some("0"), None)]
    #[case(Some("soon"), None)]
    #[case(None, None)]
    fn timestamps_are_normalized_to_millis(
        #[case] raw: Option<&str>,
        #[case] expected: Option<i64>,
    ) {
        assert_eq!(parse_timestamp(raw), expected);
    }
}
