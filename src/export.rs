use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::import::{BookmarkFileFormat, CHROME_EPOCH_OFFSET_MICROS};
use crate::model::{BookmarkNode, BookmarkTree};

#[derive(Debug, Clone, Default)]
pub struct HtmlExportOptions {
    pub firefox: bool,
    /// Falls back to "Bookmarks".
    pub title: Option<String>,
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn date_attribute(created_at: Option<i64>) -> String {
    match created_at {
        Some(ms) => format!(" ADD_DATE=\"{}\"", ms / 1000),
        None => String::new(),
    }
}

fn write_html_nodes(out: &mut String, nodes: &[BookmarkNode], depth: usize) {
    let indent = "    ".repeat(depth);
    for node in nodes {
        match &node.children {
            Some(children) => {
                let _ = writeln!(
                    out,
                    "{}<DT><H3{}>{}</H3>",
                    indent,
                    date_attribute(node.created_at),
                    escape_html(&node.title)
                );
                let _ = writeln!(out, "{}<DL><p>", indent);
                write_html_nodes(out, children, depth + 1);
                let _ = writeln!(out, "{}</DL><p>", indent);
            }
            None => {
                let icon = node
                    .icon
                    .as_deref()
                    .map(|icon| format!(" ICON=\"{}\"", escape_html(icon)))
                    .unwrap_or_default();
                let _ = writeln!(
                    out,
                    "{}<DT><A HREF=\"{}\"{}{}>{}</A>",
                    indent,
                    escape_html(node.url.as_deref().unwrap_or("")),
                    date_attribute(node.created_at),
                    icon,
                    escape_html(&node.title)
                );
            }
        }
        if let Some(description) = node.description.as_deref() {
            let _ = writeln!(out, "{}<DD>{}", indent, escape_html(description));
        }
    }
}

/// Renders `nodes` in the Netscape bookmark file format.
pub fn to_netscape_html(nodes: &[BookmarkNode], options: &HtmlExportOptions) -> String {
    let title = match (&options.title, options.firefox) {
        (Some(title), _) => title.as_str(),
        (None, true) => "Mozilla Firefox",
        (None, false) => "Bookmarks",
    };

    let mut out = String::new();
    out.push_str("<!DOCTYPE NETSCAPE-Bookmark-file-1>\n");
    out.push_str("<!-- This is an automatically generated file.\n");
    out.push_str("     It will be read and overwritten.\n");
    out.push_str("     DO NOT EDIT! -->\n");
    out.push_str("<META HTTP-EQUIV=\"Content-Type\" CONTENT=\"text/html; charset=UTF-8\">\n");
    let _ = writeln!(out, "<TITLE>{}</TITLE>", escape_html(title));
    let _ = writeln!(out, "<H1>{}</H1>", escape_html(title));
    out.push_str("<DL><p>\n");
    write_html_nodes(&mut out, nodes, 1);
    out.push_str("</DL><p>\n");
    out
}

#[derive(Serialize)]
struct ChromeNode {
    #[serde(skip_serializing_if = "Option::is_none")]
    children: Option<Vec<ChromeNode>>,
    date_added: String,
    id: String,
    name: String,
    #[serde(rename = "type")]
    node_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

#[derive(Serialize)]
struct ChromeRoots {
    bookmark_bar: ChromeNode,
    other: ChromeNode,
    synced: ChromeNode,
}

#[derive(Serialize)]
struct ChromeFile {
    checksum: String,
    roots: ChromeRoots,
    version: u32,
}

/// Out-of-range timestamps are written as "0", like a missing one.
fn to_chrome_epoch(created_at: Option<i64>) -> String {
    let micros = created_at
        .and_then(|ms| ms.checked_mul(1000))
        .and_then(|micros| micros.checked_add(CHROME_EPOCH_OFFSET_MICROS));
    match micros {
        Some(value) => value.to_string(),
        None => "0".to_string(),
    }
}

fn chrome_node(node: &BookmarkNode) -> ChromeNode {
    let children = node
        .children
        .as_ref()
        .map(|children| children.iter().map(chrome_node).collect());
    ChromeNode {
        date_added: to_chrome_epoch(node.created_at),
        id: node.id.clone(),
        name: node.title.clone(),
        node_type: if children.is_some() { "folder" } else { "url" },
        url: if children.is_some() { None } else { node.url.clone() },
        children,
    }
}

fn chrome_root(id: &str, name: &str, children: Vec<ChromeNode>) -> ChromeNode {
    ChromeNode {
        children: Some(children),
        date_added: "0".to_string(),
        id: id.to_string(),
        name: name.to_string(),
        node_type: "folder",
        url: None,
    }
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

/// A Chrome `Bookmarks` file with every node under the bookmarks bar.
pub fn to_chrome_json(nodes: &[BookmarkNode], pretty: bool) -> Result<String> {
    let file = ChromeFile {
        checksum: String::new(),
        roots: ChromeRoots {
            bookmark_bar: chrome_root(
                "1",
                "Bookmarks bar",
                nodes.iter().map(chrome_node).collect(),
            ),
            other: chrome_root("2", "Other bookmarks", Vec::new()),
            synced: chrome_root("3", "Mobile bookmarks", Vec::new()),
        },
        version: 1,
    };
    to_json(&file, pretty)
}

pub fn to_generic_json(nodes: &[BookmarkNode], pretty: bool) -> Result<String> {
    to_json(&nodes, pretty)
}

pub fn export_tree(
    tree: &BookmarkTree,
    format: BookmarkFileFormat,
    pretty: bool,
) -> Result<String> {
    match format {
        BookmarkFileFormat::ChromeHtml => Ok(to_netscape_html(
            &tree.nodes,
            &HtmlExportOptions::default(),
        )),
        BookmarkFileFormat::FirefoxHtml => Ok(to_netscape_html(
            &tree.nodes,
            &HtmlExportOptions {
                firefox: true,
                title: None,
            },
        )),
        BookmarkFileFormat::ChromeJson => to_chrome_json(&tree.nodes, pretty),
        BookmarkFileFormat::GenericJson => to_generic_json(&tree.nodes, pretty),
    }
}

pub fn save_tree(
    path: &Path,
    tree: &BookmarkTree,
    format: BookmarkFileFormat,
    pretty: bool,
) -> Result<()> {
    let content = export_tree(tree, format, pretty)?;
    std::fs::write(path, content)?;
    info!(file = %path.display(), format = %format, nodes = tree.node_count(), "Bookmarks written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::{parse, ParseOptions};
    use crate::model::Origin;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn sample() -> BookmarkTree {
        let mut rust = BookmarkNode::bookmark(
            "b1",
            "Rust <home>",
            "https://rust-lang.org/?a=1&b=2",
            &[],
            Origin::Left,
        );
        rust.created_at = Some(1_700_000_000_000);
        rust.description = Some("The \"book\"".into());
        let dev = BookmarkNode::folder("f1", "Dev", &[], Origin::Left)
            .with_child(rust)
            .with_child(BookmarkNode::folder("f2", "Empty", &[], Origin::Left));
        BookmarkTree::new("root", Origin::Left, vec![dev])
    }

    fn shape(nodes: &[BookmarkNode]) -> Vec<(Vec<String>, Option<String>, bool)> {
        let mut out = Vec::new();
        for node in nodes {
            out.push((node.path.clone(), node.url.clone(), node.is_folder()));
            out.extend(shape(node.children.as_deref().unwrap_or(&[])));
        }
        out
    }

    #[test]
    fn html_escapes_and_keeps_empty_folders() {
        let html = to_netscape_html(&sample().nodes, &HtmlExportOptions::default());

        assert!(html.starts_with("<!DOCTYPE NETSCAPE-Bookmark-file-1>"));
        assert!(html.contains("<H1>Bookmarks</H1>"));
        assert!(
            html.contains("HREF=\"https://rust-lang.org/?a=1&amp;b=2\" ADD_DATE=\"1700000000\"")
        );
        assert!(html.contains(">Rust &lt;home&gt;</A>"));
        assert!(html.contains("<DT><H3>Empty</H3>"));
        assert!(html.contains("<DD>The &quot;book&quot;"));
    }

    #[test]
    fn firefox_variant_uses_firefox_title() {
        let html = to_netscape_html(
            &[],
            &HtmlExportOptions {
                firefox: true,
                title: None,
            },
        );
        assert!(html.contains("<TITLE>Mozilla Firefox</TITLE>"));
    }

    #[test]
    fn chrome_json_wraps_nodes_in_bookmark_bar() {
        let json = to_chrome_json(&sample().nodes, false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let bar = &value["roots"]["bookmark_bar"];
        assert_eq!(bar["type"], "folder");
        assert_eq!(bar["children"][0]["name"], "Dev");
        let rust = &bar["children"][0]["children"][0];
        assert_eq!(rust["type"], "url");
        assert_eq!(rust["date_added"], "13344473600000000");
        assert_eq!(value["roots"]["other"]["children"], serde_json::json!([]));
    }

    #[rstest]
    #[case(Some(10_000_000_000_000_000), "0")]
    #[case(Some(i64::MAX), "0")]
    #[case(None, "0")]
    #[case(Some(0), "11644473600000000")]
    fn chrome_date_added_survives_huge_timestamps(
        #[case] created_at: Option<i64>,
        #[case] expected: &str,
    ) {
        let mut node = BookmarkNode::bookmark("b1", "A", "http://a", &[], Origin::Left);
        node.created_at = created_at;

        let json = to_chrome_json(&[node], false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["roots"]["bookmark_bar"]["children"][0]["date_added"], expected);
    }

    #[rstest]
    #[case(BookmarkFileFormat::ChromeHtml)]
    #[case(BookmarkFileFormat::FirefoxHtml)]
    #[case(BookmarkFileFormat::GenericJson)]
    fn exported_files_import_to_the_same_shape(#[case] format: BookmarkFileFormat) {
        let tree = sample();
        let exported = export_tree(&tree, format, true).unwrap();
        let imported = parse(&exported, format, &ParseOptions::default()).unwrap();

        assert_eq!(shape(&imported.nodes), shape(&tree.nodes));
        let rust = &imported.nodes[0].children.as_ref().unwrap()[0];
        assert_eq!(rust.title, "Rust <home>");
        assert_eq!(rust.created_at, Some(1_700_000_000_000));
    }

    #[test]
    fn chrome_json_round_trip_nests_under_bookmark_bar() {
        let exported = export_tree(&sample(), BookmarkFileFormat::ChromeJson, false).unwrap();
        let imported =
            parse(&exported, BookmarkFileFormat::ChromeJson, &ParseOptions::default()).unwrap();

        let titles: Vec<&str> = imported.nodes.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["Bookmarks bar", "Other bookmarks", "Mobile bookmarks"]);
        let dev = &imported.nodes[0].children.as_ref().unwrap()[0];
        assert_eq!(dev.path, vec!["Bookmarks bar".to_string(), "Dev".to_string()]);
    }
}
