//! Reading the package files of an EPUB: `container.xml`, the OPF package
//! document and the NCX navigation map.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::TocEntry;
use crate::error::{Error, Result};

/// Parsed OPF package document.
#[derive(Debug, Clone, Default)]
pub struct Package {
    pub metadata: PackageMetadata,
    /// Manifest items in document order.
    pub manifest: Vec<ManifestItem>,
    /// Spine itemref ids in reading order.
    pub spine: Vec<String>,
    /// Manifest id of the NCX document (`<spine toc="...">`).
    pub toc_id: String,
}

/// The parts of `<metadata>` that end up on every page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMetadata {
    pub title: String,
    pub author: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
}

impl Package {
    /// Look up a manifest item by id.
    pub fn item(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.id == id)
    }

    /// The manifest item the spine's `toc` attribute points at.
    pub fn toc_item(&self) -> Result<&ManifestItem> {
        self.item(&self.toc_id).ok_or_else(|| {
            Error::InvalidEpub(format!(
                "Couldn't find item in manifest for toc reference {} in spine section.",
                self.toc_id
            ))
        })
    }
}

/// Path of the package document, from `META-INF/container.xml`.
pub fn parse_container_xml(bytes: &[u8]) -> Result<String> {
    let content = String::from_utf8(strip_bom(bytes).to_vec())?;

    let mut reader = Reader::from_str(&content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if local_name(e.name().as_ref()) == b"rootfile" =>
            {
                if let Some(path) = attr_value(&e, b"full-path")?
                    && !path.is_empty()
                {
                    return Ok(path);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Err(Error::InvalidEpub(
        "No filepath found in 'META-INF/container.xml'".into(),
    ))
}

/// Parse an OPF package document.
///
/// The metadata, manifest and spine sections are all required, and the
/// spine must name its NCX document through the `toc` attribute.
pub fn parse_opf(content: &str) -> Result<Package> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut package = Package::default();
    let mut seen_metadata = false;
    let mut seen_manifest = false;
    let mut seen_spine = false;
    let mut toc_id: Option<String> = None;

    let mut in_metadata = false;
    let mut current: Option<MetaField> = None;
    let mut buf_text = String::new();
    let mut fallback_author: Option<String> = None;

    loop {
        let event = reader.read_event().map_err(Error::Xml)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"metadata" => {
                        seen_metadata = true;
                        in_metadata = !is_empty;
                    }
                    b"manifest" => seen_manifest = true,
                    b"spine" => {
                        seen_spine = true;
                        toc_id = attr_value(e, b"toc")?;
                    }
                    b"item" => {
                        let id = attr_value(e, b"id")?.unwrap_or_default();
                        if !id.is_empty() {
                            package.manifest.push(ManifestItem {
                                id,
                                href: attr_value(e, b"href")?.unwrap_or_default(),
                                media_type: attr_value(e, b"media-type")?.unwrap_or_default(),
                            });
                        }
                    }
                    b"itemref" => {
                        if let Some(idref) = attr_value(e, b"idref")? {
                            package.spine.push(idref);
                        }
                    }
                    b"title" if in_metadata && !is_empty => {
                        current = Some(MetaField::Title);
                        buf_text.clear();
                    }
                    b"creator" if in_metadata && !is_empty => {
                        let role = attr_value(e, b"role")?;
                        current = Some(MetaField::Creator(role));
                        buf_text.clear();
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                if current.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if current.is_some() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        buf_text.push_str(&resolved);
                    }
                }
            }
            Event::End(e) => {
                let name = e.name();
                if local_name(name.as_ref()) == b"metadata" {
                    in_metadata = false;
                }

                if let Some(field) = current.take() {
                    let text = buf_text.trim().to_string();
                    match field {
                        MetaField::Title if package.metadata.title.is_empty() => {
                            package.metadata.title = text;
                        }
                        MetaField::Creator(Some(role))
                            if role == "aut" && package.metadata.author.is_none() =>
                        {
                            package.metadata.author = Some(text);
                        }
                        MetaField::Creator(None) if fallback_author.is_none() => {
                            fallback_author = Some(text);
                        }
                        _ => {}
                    }
                    buf_text.clear();
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_metadata {
        return Err(Error::InvalidEpub(
            "No metadata section found in EPUB package.".into(),
        ));
    }
    if !seen_manifest {
        return Err(Error::InvalidEpub(
            "No manifest section found in EPUB package.".into(),
        ));
    }
    if !seen_spine {
        return Err(Error::InvalidEpub(
            "No spine section found in EPUB package.".into(),
        ));
    }

    package.toc_id = toc_id.filter(|id| !id.is_empty()).ok_or_else(|| {
        Error::InvalidEpub("Spine section in EPUB package does not have a 'toc' attribute".into())
    })?;

    if package.metadata.author.is_none() {
        package.metadata.author = fallback_author;
    }

    Ok(package)
}

enum MetaField {
    Title,
    Creator(Option<String>),
}

/// Parse the `navMap` of an NCX document into a tree of entries.
///
/// Entries keep document order at every level. A `navPoint` without a
/// `content/@src` contributes its children to its parent.
pub fn parse_ncx(content: &str) -> Result<Vec<TocEntry>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    struct NavPointState {
        children: Vec<TocEntry>,
        text: Option<String>,
        src: Option<String>,
    }

    let mut stack: Vec<NavPointState> = vec![NavPointState {
        children: Vec::new(),
        text: None,
        src: None,
    }];
    let mut in_label = false;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"navPoint" => stack.push(NavPointState {
                        children: Vec::new(),
                        text: None,
                        src: None,
                    }),
                    b"navLabel" => in_label = true,
                    b"text" => in_text = in_label,
                    b"content" => {
                        if let Some(src) = attr_value(&e, b"src")?
                            && let Some(state) = stack.last_mut()
                        {
                            state.src.get_or_insert(src);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                if local_name(name.as_ref()) == b"content"
                    && let Some(src) = attr_value(&e, b"src")?
                    && let Some(state) = stack.last_mut()
                {
                    state.src.get_or_insert(src);
                }
            }
            Ok(Event::Text(e)) => {
                if in_text && let Some(state) = stack.last_mut() {
                    let raw = String::from_utf8_lossy(e.as_ref());
                    match &mut state.text {
                        Some(existing) => existing.push_str(&raw),
                        None => state.text = Some(raw.into_owned()),
                    }
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if in_text && let Some(state) = stack.last_mut() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        match &mut state.text {
                            Some(existing) => existing.push_str(&resolved),
                            None => state.text = Some(resolved),
                        }
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"text" => in_text = false,
                    b"navLabel" => in_label = false,
                    b"navPoint" if stack.len() > 1 => {
                        if let Some(state) = stack.pop()
                            && let Some(parent) = stack.last_mut()
                        {
                            match state.src {
                                Some(src) => parent.children.push(TocEntry {
                                    title: state.text.unwrap_or_default().trim().to_string(),
                                    href: src,
                                    children: state.children,
                                }),
                                None => parent.children.extend(state.children),
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Ok(stack.into_iter().next().map(|s| s.children).unwrap_or_default())
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// `data` without a leading UTF-8 byte order mark.
pub fn strip_bom(data: &[u8]) -> &[u8] {
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    }
}

/// `dc:title` -> `title`.
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

/// Value of the attribute whose local name is `key`, unescaped.
fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes().flatten() {
        if local_name(attr.key.as_ref()) == key {
            let raw = String::from_utf8(attr.value.to_vec())?;
            return Ok(Some(unescape_attr(&raw)));
        }
    }
    Ok(None)
}

fn unescape_attr(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find(';') {
            Some(end) => match resolve_entity(&after[..end]) {
                Some(resolved) => {
                    out.push_str(&resolved);
                    rest = &after[end + 1..];
                }
                None => {
                    out.push('&');
                    rest = after;
                }
            },
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// The five predefined XML entities and numeric character references.
fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    if let Some(hex) = entity.strip_prefix("#x") {
        if let Ok(code) = u32::from_str_radix(hex, 16)
            && let Some(c) = char::from_u32(code)
        {
            return Some(c.to_string());
        }
    } else if let Some(dec) = entity.strip_prefix('#')
        && let Ok(code) = dec.parse::<u32>()
        && let Some(c) = char::from_u32(code)
    {
        return Some(c.to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" xmlns:dc="http://purl.org/dc/elements/1.1/"
         xmlns:opf="http://www.idpf.org/2007/opf" version="2.0">
  <metadata>
    <dc:title>Food &amp; Wisdom</dc:title>
    <dc:creator opf:role="edt">An Editor</dc:creator>
    <dc:creator opf:role="aut">Ajahn Someone</dc:creator>
  </metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="ch1" href="Text/chapter1.xhtml" media-type="application/xhtml+xml"/>
    <item id="css" href="Styles/main.css" media-type="text/css"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="ch1"/>
  </spine>
</package>"#;

    #[test]
    fn test_strip_bom() {
        let with_bom = &[0xEF, 0xBB, 0xBF, b'h', b'i'];
        assert_eq!(strip_bom(with_bom), b"hi");
        assert_eq!(strip_bom(b"hello"), b"hello");

        // Partial BOM (not stripped)
        let partial = &[0xEF, 0xBB, b'x'];
        assert_eq!(strip_bom(partial), partial);
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"title"), b"title");
        assert_eq!(local_name(b"dc:title"), b"title");
        assert_eq!(local_name(b"opf:role"), b"role");
    }

    #[test]
    fn test_resolve_entity() {
        assert_eq!(resolve_entity("amp"), Some("&".to_string()));
        assert_eq!(resolve_entity("#65"), Some("A".to_string()));
        assert_eq!(resolve_entity("#x2019"), Some("\u{2019}".to_string()));
        assert_eq!(resolve_entity("nbsp"), None);
    }

    #[test]
    fn test_unescape_attr() {
        assert_eq!(unescape_attr("a&amp;b"), "a&b");
        assert_eq!(unescape_attr("plain"), "plain");
        assert_eq!(unescape_attr("broken & value"), "broken & value");
    }

    #[test]
    fn test_parse_container_xml() {
        let container = br#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;
        assert_eq!(parse_container_xml(container).unwrap(), "OEBPS/content.opf");
    }

    #[test]
    fn test_parse_container_xml_without_rootfile() {
        let container = br#"<container><rootfiles/></container>"#;
        let err = parse_container_xml(container).unwrap_err();
        assert!(err.to_string().contains("META-INF/container.xml"));
    }

    #[test]
    fn test_parse_container_xml_invalid_utf8() {
        let container = b"<container><rootfile full-path=\"\xff.opf\"/></container>";
        assert!(matches!(parse_container_xml(container), Err(Error::Utf8(_))));
    }

    #[test]
    fn test_parse_opf() {
        let package = parse_opf(OPF).unwrap();
        assert_eq!(package.metadata.title, "Food & Wisdom");
        assert_eq!(package.metadata.author.as_deref(), Some("Ajahn Someone"));
        assert_eq!(package.toc_id, "ncx");
        assert_eq!(package.spine, vec!["ch1"]);
        let ids: Vec<_> = package.manifest.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["ncx", "ch1", "css"]);
        assert_eq!(package.toc_item().unwrap().href, "toc.ncx");
    }

    #[test]
    fn test_parse_opf_author_without_role() {
        let opf = r#"<package><metadata><dc:title>T</dc:title><dc:creator>Plain Author</dc:creator></metadata>
<manifest/><spine toc="ncx"/></package>"#;
        let package = parse_opf(opf).unwrap();
        assert_eq!(package.metadata.author.as_deref(), Some("Plain Author"));
    }

    #[test]
    fn test_parse_opf_missing_sections() {
        let no_meta = r#"<package><manifest/><spine toc="ncx"/></package>"#;
        assert!(parse_opf(no_meta).unwrap_err().to_string().contains("metadata"));

        let no_manifest = r#"<package><metadata/><spine toc="ncx"/></package>"#;
        assert!(parse_opf(no_manifest).unwrap_err().to_string().contains("manifest"));

        let no_toc = r#"<package><metadata/><manifest/><spine/></package>"#;
        assert!(parse_opf(no_toc).unwrap_err().to_string().contains("'toc'"));
    }

    #[test]
    fn test_toc_item_missing_from_manifest() {
        let opf = r#"<package><metadata/><manifest/><spine toc="nope"/></package>"#;
        let package = parse_opf(opf).unwrap();
        assert!(package.toc_item().is_err());
    }

    #[test]
    fn test_parse_ncx_nested() {
        let ncx = r#"<?xml version="1.0"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/">
  <docTitle><text>Book</text></docTitle>
  <navMap>
    <navPoint id="p1" playOrder="1">
      <navLabel><text>Part One</text></navLabel>
      <content src="Text/part1.xhtml"/>
      <navPoint id="p1c1" playOrder="2">
        <navLabel><text>Chapter 1</text></navLabel>
        <content src="Text/chapter1.xhtml#start"/>
      </navPoint>
    </navPoint>
    <navPoint id="p2" playOrder="3">
      <navLabel><text>Part Two</text></navLabel>
      <content src="Text/part2.xhtml"/>
    </navPoint>
  </navMap>
</ncx>"#;
        let toc = parse_ncx(ncx).unwrap();
        assert_eq!(toc.len(), 2);
        assert_eq!(toc[0].title, "Part One");
        assert_eq!(toc[0].children.len(), 1);
        assert_eq!(toc[0].children[0].href, "Text/chapter1.xhtml#start");
        assert_eq!(toc[1].title, "Part Two");
        assert!(toc[1].children.is_empty());
    }
}
