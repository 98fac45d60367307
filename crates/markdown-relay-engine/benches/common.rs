// Benchmark helpers live in their own module; not every bench uses all of them.
#[allow(dead_code)]
pub fn generate_markdown_content(size: usize) -> String {
    let base = "# Title\n\n## Section\n\nParagraph with *some* content &amp; a [link](https://example.com \"Example\").\n\n- Bullet point\n  - Nested item\n- [x] Done item\n\n| a | b |\n|:--|--:|\n| 1 | 2 |\n\n```rust\nfn example() {\n    println!(\"Hello\");\n}\n```\n\n";
    base.repeat(size)
}

#[allow(dead_code)]
pub fn generate_nested_quotes(depth: usize) -> String {
    let mut content = String::new();
    for level in 1..=depth {
        content.push_str(&"> ".repeat(level));
        content.push_str(&format!("Quote level {level} with `code` and **bold**\n"));
    }
    content
}
