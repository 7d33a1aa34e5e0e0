#![allow(dead_code)]

use bookdiff::model::{BookmarkNode, BookmarkTree, Origin, Side};

pub const LEFT_HTML: &str = r#"<!DOCTYPE NETSCAPE-Bookmark-file-1>
<META HTTP-EQUIV="Content-Type" CONTENT="text/html; charset=UTF-8">
<TITLE>Bookmarks</TITLE>
<H1>Bookmarks</H1>
<DL><p>
    <DT><H3 ADD_DATE="1700000000">Dev</H3>
    <DL><p>
        <DT><A HREF="https://crates.io/" ADD_DATE="1700000001">Crates</A>
        <DT><A HREF="https://docs.rs/old" ADD_DATE="1700000002">Docs</A>
    </DL><p>
    <DT><A HREF="https://news.example/">News</A>
</DL><p>
"#;

pub const RIGHT_JSON: &str = r#"[
  { "title": "Dev", "children": [
      { "title": "Docs", "url": "https://docs.rs/new" },
      { "title": "Blog", "url": "https://blog.rust-lang.org/" }
  ] },
  { "title": "News", "url": "https://news.example/" }
]"#;

pub fn path(segments: &[&str]) -> Vec<String> {
    segments.iter().map(|s| s.to_string()).collect()
}

pub fn link(id: &str, title: &str, url: &str, side: Side) -> BookmarkNode {
    BookmarkNode::bookmark(id, title, url, &[], side.into())
}

pub fn folder(id: &str, title: &str, side: Side, children: Vec<BookmarkNode>) -> BookmarkNode {
    children
        .into_iter()
        .fold(BookmarkNode::folder(id, title, &[], side.into()), |folder, child| {
            folder.with_child(child)
        })
}

pub fn tree(side: Side, nodes: Vec<BookmarkNode>) -> BookmarkTree {
    BookmarkTree::new(format!("{}-root", side), Origin::from(side), nodes)
}

/// Left: Dev/{Crates, Docs(old)}, News. Right: Dev/{Docs(new), Blog}, News.
pub fn sample_trees() -> (BookmarkTree, BookmarkTree) {
    let left = tree(
        Side::Left,
        vec![
            folder(
                "l-dev",
                "Dev",
                Side::Left,
                vec![
                    link("l-crates", "Crates", "https://crates.io/", Side::Left),
                    link("l-docs", "Docs", "https://docs.rs/old", Side::Left),
                ],
            ),
            link("l-news", "News", "https://news.example/", Side::Left),
        ],
    );
    let right = tree(
        Side::Right,
        vec![
            folder(
                "r-dev",
                "Dev",
                Side::Right,
                vec![
                    link("r-docs", "Docs", "https://docs.rs/new", Side::Right),
                    link("r-blog", "Blog", "https://blog.rust-lang.org/", Side::Right),
                ],
            ),
            link("r-news", "News", "https://news.example/", Side::Right),
        ],
    );
    (left, right)
}
