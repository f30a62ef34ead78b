use std::fmt;

/// Type name as written in a cast or column definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeName {
    pub names: Vec<String>,
    pub typmods: Vec<i32>,
    /// Number of `[]` suffixes
    pub array_bounds: u32,
    pub location: Option<usize>,
}

impl TypeName {
    pub fn new(name: &str) -> Self {
        Self {
            names: name.split('.').map(str::to_string).collect(),
            typmods: vec![],
            array_bounds: 0,
            location: None,
        }
    }

    pub fn with_typmods(mut self, typmods: Vec<i32>) -> Self {
        self.typmods = typmods;
        self
    }

    pub fn array(mut self) -> Self {
        self.array_bounds += 1;
        self
    }

    pub fn last_name(&self) -> &str {
        self.names.last().map(String::as_str).unwrap_or("")
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names.join("."))?;
        if !self.typmods.is_empty() {
            let mods = self.typmods.iter().map(i32::to_string).collect::<Vec<_>>();
            write!(f, "({})", mods.join(","))?;
        }
        for _ in 0..self.array_bounds {
            f.write_str("[]")?;
        }
        Ok(())
    }
}
