use std::collections::HashMap;
use tracing::{info, warn};

use crate::config::{EnrichmentConfig, OrganizationRecord};
use crate::models::{CellValue, NormalizedTable};

const ORG_COLUMN_CANDIDATES: &[&str] = &["机构名称", "机构"];

/// Full-width ASCII variants and the ideographic space to their half-width forms.
pub fn to_halfwidth(s: &str) -> String {
    s.chars()
        .map(|c| match c as u32 {
            0x3000 => ' ',
            code @ 0xFF01..=0xFF5E => char::from_u32(code - 0xFEE0).unwrap_or(c),
            _ => c,
        })
        .collect()
}

/// Canonical form used to match organisation names across sources.
pub fn normalize_org_name(s: &str) -> String {
    let halfwidth = to_halfwidth(s).replace('（', "(").replace('）', ")");
    halfwidth.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Adds a city column by looking organisation names up in a dimension table.
#[derive(Debug, Clone)]
pub struct OrgCityEnricher {
    org_column: Option<String>,
    target_column: String,
    org_to_city: HashMap<String, String>,
}

impl OrgCityEnricher {
    /// Any of branch, united or city short name maps to the record's city.
    /// The first record to claim a name wins.
    pub fn new(
        org_column: Option<String>,
        target_column: impl Into<String>,
        organizations: &[OrganizationRecord],
    ) -> Self {
        let mut org_to_city = HashMap::new();
        for record in organizations {
            let city = record.city_short_name.clone().unwrap_or_default();
            let names = [
                &record.branch_short_name,
                &record.united_short_name,
                &record.city_short_name,
            ];
            for name in names.into_iter().flatten() {
                let key = normalize_org_name(name);
                if !key.is_empty() {
                    org_to_city.entry(key).or_insert_with(|| city.clone());
                }
            }
        }

        Self {
            org_column,
            target_column: target_column.into(),
            org_to_city,
        }
    }

    pub fn from_config(config: &EnrichmentConfig) -> Self {
        Self::new(
            config.org_column.clone(),
            config.target_column.clone(),
            &config.organizations,
        )
    }

    pub fn city_for(&self, org_name: &str) -> Option<&str> {
        self.org_to_city
            .get(&normalize_org_name(org_name))
            .map(String::as_str)
    }

    fn resolve_org_column(&self, table: &NormalizedTable) -> Option<usize> {
        self.org_column
            .as_deref()
            .into_iter()
            .chain(ORG_COLUMN_CANDIDATES.iter().copied())
            .find_map(|name| table.column_index(name))
    }

    /// Returns a copy of `table` with the target column set on every row;
    /// unmatched organisations get empty text.
    pub fn enrich(&self, table: &NormalizedTable) -> NormalizedTable {
        let org_index = self.resolve_org_column(table);
        if org_index.is_none() {
            warn!(
                "'{}': no organisation column found, adding empty '{}'",
                table.source_name(),
                self.target_column
            );
        }

        let existing = table.column_index(&self.target_column);
        let mut columns = table.columns().to_vec();
        if existing.is_none() {
            columns.push(self.target_column.clone());
        }

        let mut matched = 0;
        let rows: Vec<Vec<CellValue>> = table
            .rows()
            .iter()
            .map(|row| {
                let city = org_index
                    .and_then(|i| row.get(i))
                    .filter(|c| !c.is_null())
                    .and_then(|c| self.city_for(&c.to_string()))
                    .unwrap_or("");
                if !city.is_empty() {
                    matched += 1;
                }

                let mut out = row.clone();
                match existing {
                    Some(i) => out[i] = CellValue::text(city),
                    None => out.push(CellValue::text(city)),
                }
                out
            })
            .collect();

        info!(
            "'{}': city column filled for {}/{} row(s)",
            table.source_name(),
            matched,
            rows.len()
        );

        NormalizedTable::new(
            table.source_name(),
            columns,
            rows,
            table.as_of().cloned(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(branch: &str, united: Option<&str>, city: &str) -> OrganizationRecord {
        OrganizationRecord {
            branch_short_name: Some(branch.to_string()),
            united_short_name: united.map(str::to_string),
            city_short_name: Some(city.to_string()),
        }
    }

    fn table(org_column: &str) -> NormalizedTable {
        NormalizedTable::new(
            "报表",
            vec![org_column.to_string(), "余额".to_string()],
            vec![
                vec![CellValue::text("雁塔支行"), CellValue::Number(1.0)],
                vec![CellValue::text("渭南（临渭）联社"), CellValue::Number(2.0)],
                vec![CellValue::text("未知机构"), CellValue::Number(3.0)],
            ],
            None,
        )
    }

    #[test]
    fn test_halfwidth_normalization() {
        assert_eq!(to_halfwidth("ＡＢＣ１２３"), "ABC123");
        assert_eq!(normalize_org_name("　渭南（临渭）  联社 "), "渭南(临渭) 联社");
    }

    #[test]
    fn test_enrich_matches_any_short_name() {
        let enricher = OrgCityEnricher::new(
            None,
            "地市",
            &[
                record("雁塔支行", None, "西安"),
                record("临渭支行", Some("渭南(临渭)联社"), "渭南"),
                record("雁塔支行", None, "宝鸡"),
            ],
        );

        let enriched = enricher.enrich(&table("机构名称"));
        assert_eq!(enriched.columns(), &["机构名称", "余额", "地市"]);
        assert_eq!(enriched.rows()[0][2], CellValue::text("西安"));
        assert_eq!(enriched.rows()[1][2], CellValue::text("渭南"));
        assert_eq!(enriched.rows()[2][2], CellValue::text(""));
    }

    #[test]
    fn test_falls_back_to_org_column_candidates() {
        let enricher = OrgCityEnricher::new(
            Some("网点".to_string()),
            "地市",
            &[record("雁塔支行", None, "西安")],
        );
        let enriched = enricher.enrich(&table("机构"));
        assert_eq!(enriched.rows()[0][2], CellValue::text("西安"));
    }

    #[test]
    fn test_missing_org_column_adds_empty_target() {
        let enricher = OrgCityEnricher::new(None, "地市", &[record("雁塔支行", None, "西安")]);
        let enriched = enricher.enrich(&table("网点"));
        assert_eq!(enriched.width(), 3);
        assert!(enriched.rows().iter().all(|r| r[2] == CellValue::text("")));
    }
}
