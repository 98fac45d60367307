use serde::Serialize;

use super::Align;
use crate::attribute::Attribute;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UnorderedListDetail {
    /// Loose lists separate their items' content into paragraphs.
    pub is_tight: bool,
    /// Bullet character: `-`, `*` or `+`.
    pub mark: char,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderedListDetail {
    pub start: u32,
    pub is_tight: bool,
    /// `.` or `)`.
    pub mark_delimiter: char,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ListItemDetail {
    /// Present when the item starts with a `[ ]` / `[x]` task marker.
    pub task: Option<TaskMark>,
}

impl ListItemDetail {
    pub fn is_task(&self) -> bool {
        self.task.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskMark {
    /// The character between the brackets: `' '`, `'x'` or `'X'`.
    pub mark: char,
    /// Byte offset of `mark` in the input.
    pub offset: usize,
}

impl TaskMark {
    pub fn is_checked(&self) -> bool {
        matches!(self.mark, 'x' | 'X')
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeadingDetail {
    /// 1 to 6.
    pub level: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeBlockDetail<A = Attribute> {
    /// `` ` `` or `~` for fenced blocks, `None` for indented ones.
    pub fence_char: Option<char>,
    /// The whole info string after the opening fence.
    pub info: A,
    /// The first word of the info string.
    pub lang: A,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TableDetail {
    pub col_count: u32,
    pub head_row_count: u32,
    pub body_row_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CellDetail {
    pub align: Align,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkDetail<A = Attribute> {
    pub href: A,
    pub title: A,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageDetail<A = Attribute> {
    pub src: A,
    pub title: A,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WikiLinkDetail<A = Attribute> {
    pub target: A,
}
