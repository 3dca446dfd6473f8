//! Page scripts evaluated by the pipeline. Each is a self-invoking
//! expression returning plain JSON; post-processing happens in
//! [`crate::extract`].

/// Rendered text of a copy of `<body>` without script, style and noscript
/// elements. Empty when the document has no body.
pub const VISIBLE_TEXT: &str = r#"(() => {
  if (!document.body) return '';
  const clone = document.body.cloneNode(true);
  clone.querySelectorAll('script, style, noscript').forEach(el => el.remove());
  return clone.innerText;
})()"#;

/// Every `a[href]` in document order with its absolute href.
pub const LINKS: &str = r#"(() => Array.from(document.querySelectorAll('a[href]')).map(a => ({
  text: a.innerText,
  href: a.href,
})))()"#;

/// Every `img[src]` in document order with its absolute src.
pub const IMAGES: &str = r#"(() => Array.from(document.querySelectorAll('img[src]')).map(img => ({
  src: img.src,
  alt: img.getAttribute('alt'),
})))()"#;

/// Title plus the raw attributes of every `<meta>` tag.
pub const METADATA: &str = r#"(() => ({
  title: document.title,
  tags: Array.from(document.querySelectorAll('meta')).map(m => ({
    name: m.getAttribute('name'),
    property: m.getAttribute('property'),
    content: m.getAttribute('content'),
  })),
}))()"#;
