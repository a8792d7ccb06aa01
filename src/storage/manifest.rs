use serde::{Deserialize, Serialize};

/// 데이터 없이 저장하는 카탈로그 모양. 빈 데이터베이스와 빈 테이블, 테이블 용량은 CSV에 남지 않는다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub databases: Vec<DatabaseEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseEntry {
    pub name: String,
    #[serde(default)]
    pub tables: Vec<TableEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntry {
    pub name: String,
    pub capacity: usize,
    #[serde(default)]
    pub columns: Vec<String>,
}

impl Manifest {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_toml_keeps_empty_entries() {
        let manifest = Manifest {
            databases: vec![
                DatabaseEntry {
                    name: "db0".to_string(),
                    tables: Vec::new(),
                },
                DatabaseEntry {
                    name: "db1".to_string(),
                    tables: vec![TableEntry {
                        name: "db1.t".to_string(),
                        capacity: 3,
                        columns: vec!["db1.t.a".to_string()],
                    }],
                },
            ],
        };
        let text = manifest.to_toml().unwrap();
        assert_eq!(Manifest::from_toml(&text).unwrap(), manifest);
    }

    #[test]
    fn test_missing_capacity_is_rejected() {
        let text = "[[databases]]\nname = \"db1\"\n[[databases.tables]]\nname = \"db1.t\"\n";
        assert!(Manifest::from_toml(text).is_err());
        assert_eq!(Manifest::from_toml("").unwrap(), Manifest::default());
    }
}
