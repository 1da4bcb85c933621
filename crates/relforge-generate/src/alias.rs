/// Alias of the entity table in every generated query.
pub const MAIN_ALIAS: &str = "a";

// two-letter aliases that are T-SQL keywords
const RESERVED: [&str; 9] = ["as", "by", "if", "in", "is", "of", "on", "or", "to"];

/// Hands out join aliases `b`, `c`, ..., `z`, `aa`, `ab`, ...
///
/// `a` is reserved for the main table and keywords are skipped.
#[derive(Debug, Clone)]
pub struct AliasAllocator {
    next: usize,
}

impl Default for AliasAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl AliasAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn allocate(&mut self) -> String {
        loop {
            let alias = alias_for(self.next);
            self.next += 1;
            if !RESERVED.contains(&alias.as_str()) {
                return alias;
            }
        }
    }
}

// bijective base-26: 0 -> a, 25 -> z, 26 -> aa
fn alias_for(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'a' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.iter().rev().map(|byte| *byte as char).collect()
}
