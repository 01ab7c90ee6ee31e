//! Terminal rendering for the category CLI.

use crate::category::{Category, CategoryNode};
use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use crossterm::style::{Attribute, Stylize};
use unicode_width::UnicodeWidthStr;

pub fn get_styles() -> Styles {
    let bold = |color: AnsiColor| Style::new().bold().fg_color(Some(Color::Ansi(color)));
    Styles::styled()
        .usage(bold(AnsiColor::Cyan).underline())
        .header(bold(AnsiColor::Cyan).underline())
        .literal(bold(AnsiColor::Green))
        .invalid(bold(AnsiColor::Red))
        .error(bold(AnsiColor::Red))
        .valid(bold(AnsiColor::Green))
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
}

pub mod colors {
    use crossterm::style::Color;

    pub const ACCENT: Color = Color::Rgb {
        r: 0,
        g: 215,
        b: 255,
    };
    pub const BRANCH: Color = Color::Rgb {
        r: 140,
        g: 110,
        b: 220,
    };
    pub const COUNT: Color = Color::Rgb {
        r: 255,
        g: 200,
        b: 60,
    };
    pub const OK: Color = Color::Rgb {
        r: 80,
        g: 250,
        b: 123,
    };
    pub const WARN: Color = Color::Rgb {
        r: 255,
        g: 160,
        b: 50,
    };
    pub const ERR: Color = Color::Rgb {
        r: 255,
        g: 85,
        b: 85,
    };
    pub const DIM: Color = Color::Rgb {
        r: 110,
        g: 110,
        b: 130,
    };
    pub const TEXT: Color = Color::Rgb {
        r: 235,
        g: 235,
        b: 240,
    };
}

pub mod glyphs {
    pub const TEE: &str = "├── ";
    pub const ELBOW: &str = "└── ";
    pub const PIPE: &str = "│   ";
    pub const BLANK: &str = "    ";
    pub const CRUMB: &str = " › ";
    pub const CHECK: &str = "✓";
    pub const CROSS_MARK: &str = "✗";
    pub const WARNING: &str = "⚠";
}

pub fn print_success(message: &str) {
    println!(
        " {} {}",
        glyphs::CHECK.with(colors::OK).bold(),
        message.with(colors::OK)
    );
}

pub fn print_error(message: &str) {
    eprintln!(
        " {} {}",
        glyphs::CROSS_MARK.with(colors::ERR).bold(),
        message.with(colors::ERR)
    );
}

pub fn print_warning(message: &str) {
    println!(
        " {} {}",
        glyphs::WARNING.with(colors::WARN).bold(),
        message.with(colors::WARN)
    );
}

/// One rendered row of a category tree: the connector drawn before the node
/// and the node itself.
pub struct TreeLine<'a> {
    pub prefix: String,
    pub node: &'a CategoryNode,
}

/// Lays out `forest` depth-first with box-drawing connectors. Roots have an
/// empty prefix.
pub fn tree_lines(forest: &[CategoryNode]) -> Vec<TreeLine<'_>> {
    let mut lines = Vec::new();
    // (node, indentation inherited from ancestors, connector or None for roots)
    let mut stack: Vec<(&CategoryNode, String, Option<bool>)> = forest
        .iter()
        .rev()
        .map(|node| (node, String::new(), None))
        .collect();

    while let Some((node, indent, is_last)) = stack.pop() {
        let (prefix, child_indent) = match is_last {
            None => (String::new(), String::new()),
            Some(true) => (
                format!("{}{}", indent, glyphs::ELBOW),
                format!("{}{}", indent, glyphs::BLANK),
            ),
            Some(false) => (
                format!("{}{}", indent, glyphs::TEE),
                format!("{}{}", indent, glyphs::PIPE),
            ),
        };
        let last_index = node.children.len().saturating_sub(1);
        for (i, child) in node.children.iter().enumerate().rev() {
            stack.push((child, child_indent.clone(), Some(i == last_index)));
        }
        lines.push(TreeLine { prefix, node });
    }
    lines
}

pub fn print_tree(forest: &[CategoryNode]) {
    if forest.is_empty() {
        print_empty("no categories yet");
        return;
    }
    for line in tree_lines(forest) {
        let category = &line.node.category;
        println!(
            "  {}{} {} {}",
            line.prefix.as_str().with(colors::BRANCH),
            category.name.as_str().with(colors::TEXT).bold(),
            format!("#{} [{}]", category.id, category.path).with(colors::DIM),
            format!("{}/{}", line.node.item_count, line.node.total_count).with(colors::COUNT),
        );
    }
}

pub fn print_breadcrumbs(chain: &[Category]) {
    let names: Vec<&str> = chain.iter().map(|c| c.name.as_str()).collect();
    println!("  {}", names.join(glyphs::CRUMB).with(colors::ACCENT));
}

pub fn print_empty(message: &str) {
    println!(
        "  {}",
        message.with(colors::DIM).attribute(Attribute::Italic)
    );
}

/// Column-aligned table, widths measured in terminal cells.
pub struct TableBuilder {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TableBuilder {
    pub fn new(headers: &[&str]) -> Self {
        TableBuilder {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.width()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.width());
            }
        }
        widths
    }

    /// Plain text rows, header first, cells padded to their column width.
    pub fn render(&self) -> Vec<String> {
        let widths = self.column_widths();
        let pad = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| {
                    format!("{}{}", cell, " ".repeat(width.saturating_sub(cell.width())))
                })
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };
        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        lines.push(pad(self.headers.as_slice()));
        lines.extend(self.rows.iter().map(|row| pad(row.as_slice())));
        lines
    }

    pub fn print(&self) {
        let mut lines = self.render().into_iter();
        if let Some(header) = lines.next() {
            println!("  {}", header.with(colors::ACCENT).bold());
        }
        for line in lines {
            println!("  {}", line.with(colors::TEXT));
        }
    }
}

pub fn get_prompt(tenant: i64) -> String {
    format!("tenant {} ❯ ", tenant)
}

/// Colors a prompt produced by [`get_prompt`].
pub fn style_prompt(prompt: &str) -> String {
    match prompt.split_once('❯') {
        Some((scope, rest)) => format!(
            "{}{}{}",
            scope.with(colors::DIM),
            "❯".with(colors::ACCENT).bold(),
            rest
        ),
        None => prompt.with(colors::ACCENT).to_string(),
    }
}

pub fn print_welcome(db_path: &str, tenant: i64) {
    println!();
    println!("  {}", "Catalog categories".with(colors::ACCENT).bold());
    println!(
        "  {} {}",
        "Database:".with(colors::DIM),
        db_path.with(colors::TEXT)
    );
    println!(
        "  {} {}",
        "Tenant:".with(colors::DIM),
        tenant.to_string().with(colors::TEXT)
    );
    println!(
        "  {}",
        "Type 'help' for available commands".with(colors::DIM)
    );
    println!();
}

pub fn print_goodbye() {
    println!();
    println!("  {}", "Bye.".with(colors::BRANCH).bold());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::{CategoryId, TenantId};

    fn node(id: i64, path: &str, children: Vec<CategoryNode>) -> CategoryNode {
        CategoryNode {
            category: Category {
                id: CategoryId(id),
                tenant_id: TenantId(1),
                parent_id: None,
                name: format!("c{}", id),
                path: path.to_string(),
                level: path.split('.').count() as u32 - 1,
                sort_order: 1,
            },
            item_count: 0,
            total_count: 0,
            children,
        }
    }

    #[test]
    fn tree_lines_draw_connectors() {
        let forest = vec![
            node(
                1,
                "1",
                vec![
                    node(2, "1.1", vec![node(4, "1.1.1", vec![])]),
                    node(3, "1.2", vec![]),
                ],
            ),
            node(5, "2", vec![]),
        ];

        let lines: Vec<(String, i64)> = tree_lines(&forest)
            .into_iter()
            .map(|l| (l.prefix, l.node.category.id.0))
            .collect();

        assert_eq!(
            lines,
            vec![
                ("".to_string(), 1),
                ("├── ".to_string(), 2),
                ("│   └── ".to_string(), 4),
                ("└── ".to_string(), 3),
                ("".to_string(), 5),
            ]
        );
    }

    #[test]
    fn table_pads_by_display_width() {
        let mut table = TableBuilder::new(&["id", "name"]);
        table.add_row(vec!["1".to_string(), "Séries".to_string()]);
        table.add_row(vec!["12".to_string(), "Film".to_string()]);

        assert_eq!(
            table.render(),
            vec![
                "id  name".to_string(),
                "1   Séries".to_string(),
                "12  Film".to_string(),
            ]
        );
    }
}
