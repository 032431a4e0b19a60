use log::{debug, info, warn};
use std::collections::HashMap;

use crate::config::*;
use crate::normalize::*;

/// The reference registry: every village code, reachable from several
/// spellings of its (county, district, village) names.
#[derive(Debug, Clone, Default)]
pub struct CodeRegistry {
    by_key: HashMap<VillageKey, VillageCode>,
    by_code: HashMap<String, VillageCode>,
}

impl CodeRegistry {
    pub fn new() -> CodeRegistry {
        CodeRegistry::default()
    }

    /// Builds the registry from the features of the reference dataset.
    /// Features without a village name are ignored.
    pub fn from_codes<I>(codes: I, rules: &LinkageRules) -> CodeRegistry
    where
        I: IntoIterator<Item = VillageCode>,
    {
        let mut reg = CodeRegistry::new();
        for c in codes {
            reg.register(c, rules);
        }
        info!(
            "CodeRegistry: {} village codes under {} keys",
            reg.by_code.len(),
            reg.by_key.len()
        );
        reg
    }

    /// Registers a code under its four key variants.
    ///
    /// An exact spelling always takes the key. A variant spelling only
    /// takes a key that is still free.
    pub fn register(&mut self, code: VillageCode, rules: &LinkageRules) {
        if code.village_name.is_empty() {
            return;
        }
        let keys = registry_keys(
            &code.county_name,
            &code.district_name,
            &code.village_name,
            rules,
        );
        for (idx, key) in keys.into_iter().enumerate() {
            if idx == 0 {
                self.by_key.insert(key, code.clone());
            } else {
                self.by_key.entry(key).or_insert_with(|| code.clone());
            }
        }
        self.by_code.insert(code.code.clone(), code);
    }

    pub fn lookup(&self, key: &VillageKey) -> Option<&VillageCode> {
        self.by_key.get(key)
    }

    pub fn by_code(&self, code: &str) -> Option<&VillageCode> {
        self.by_code.get(code)
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

/// Resolves the villages of the recall data to their codes: manual
/// overrides first, then the registry.
pub struct Resolver<'a> {
    rules: &'a LinkageRules,
    registry: &'a CodeRegistry,
    overrides: HashMap<String, ManualOverride>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        rules: &'a LinkageRules,
        registry: &'a CodeRegistry,
        overrides: &[ManualOverride],
    ) -> Result<Resolver<'a>, LinkageError> {
        let mut m: HashMap<String, ManualOverride> = HashMap::new();
        for o in overrides {
            if o.codes.iter().all(|c| c.is_empty()) {
                return Err(LinkageError::EmptyOverride(o.cunli_key.clone()));
            }
            // The last entry for a key wins.
            if let Some(previous) = m.insert(o.cunli_key.clone(), o.clone()) {
                warn!(
                    "Resolver: manual override {} defined more than once, {:?} replaced by {:?}",
                    o.cunli_key, previous.codes, o.codes
                );
            }
        }
        if !m.is_empty() {
            info!("Resolver: {} manual overrides", m.len());
        }
        Ok(Resolver {
            rules,
            registry,
            overrides: m,
        })
    }

    pub fn rules(&self) -> &LinkageRules {
        self.rules
    }

    pub fn num_overrides(&self) -> usize {
        self.overrides.len()
    }

    /// The normalized county named by a recall case label.
    pub fn county_for(&self, recall_case: &str) -> Option<String> {
        county_from_case_label(recall_case, self.rules).map(|c| normalize_county(&c, self.rules))
    }

    /// Resolves one village of the recall data.
    ///
    /// `recall_case` is the label of the village's first record, which
    /// tells the county.
    pub fn resolve(&self, key: &CunliKey, recall_case: &str) -> Resolution {
        let county = self.county_for(recall_case);

        if let Some(o) = self.overrides.get(&key.to_string()) {
            let codes: Vec<String> = o.codes.iter().filter(|c| !c.is_empty()).cloned().collect();
            // Checked at construction: there is at least one code.
            let primary = &codes[0];
            let code = match self.registry.by_code(primary) {
                Some(c) => c.clone(),
                None => VillageCode {
                    code: primary.clone(),
                    county_code: prefix(primary, 3),
                    district_code: prefix(primary, 6),
                    county_name: o.county.clone(),
                    district_name: o.district.clone(),
                    village_name: o.village.clone(),
                },
            };
            debug!("resolve: {} -> {:?} (manual)", key, codes);
            return Resolution::Resolved {
                code,
                associated: codes,
                source: CodeSource::Manual,
            };
        }

        let county = match county {
            Some(c) => c,
            None => {
                warn!(
                    "resolve: {}: no county in recall case {:?}",
                    key, recall_case
                );
                return Resolution::Unresolved(UnresolvedVillage {
                    cunli_key: key.clone(),
                    county: None,
                    key_tried: None,
                });
            }
        };

        let vkey = VillageKey::new(&county, &key.district, &key.village);
        match self.registry.lookup(&vkey) {
            Some(c) => {
                debug!("resolve: {} -> {}", vkey, c.code);
                Resolution::Resolved {
                    code: c.clone(),
                    associated: vec![c.code.clone()],
                    source: CodeSource::Registry,
                }
            }
            None => {
                debug!("resolve: {} not in registry", vkey);
                Resolution::Unresolved(UnresolvedVillage {
                    cunli_key: key.clone(),
                    county: Some(county),
                    key_tried: Some(vkey),
                })
            }
        }
    }
}

fn prefix(s: &str, n: usize) -> String {
    if s.chars().count() >= n {
        s.chars().take(n).collect()
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(code: &str, county: &str, district: &str, village: &str) -> VillageCode {
        VillageCode {
            code: code.to_string(),
            county_code: code[..5].to_string(),
            district_code: code[..8].to_string(),
            county_name: county.to_string(),
            district_name: district.to_string(),
            village_name: village.to_string(),
        }
    }

    fn registry(rules: &LinkageRules) -> CodeRegistry {
        CodeRegistry::from_codes(
            vec![
                code("63000050001", "臺北市", "中正區", "建國里"),
                code("65000040036", "新北市", "永和區", "光復里"),
                code("10018010001", "新竹市", "東區", "光復里"),
                code("99999999999", "無名縣", "某鄉", ""),
            ],
            rules,
        )
    }

    const TAIPEI_CASE: &str = "第11屆立法委員(臺北市第8選舉區)賴士葆罷免案";

    #[test]
    fn registry_skips_features_without_village() {
        let rules = LinkageRules::recall_2025();
        let reg = registry(&rules);
        assert_eq!(reg.len(), 3);
        assert!(reg.by_code("99999999999").is_none());
    }

    #[test]
    fn resolves_through_normalized_county() {
        let rules = LinkageRules::recall_2025();
        let reg = registry(&rules);
        let resolver = Resolver::new(&rules, &reg, &[]).unwrap();
        let res = resolver.resolve(&CunliKey::new("中正區", "建國里"), TAIPEI_CASE);
        let c = res.code().unwrap();
        assert_eq!(c.code, "63000050001");
        // The names of the registry are kept.
        assert_eq!(c.county_name, "臺北市");
        assert_eq!(res.associated_codes(), &["63000050001".to_string()]);
    }

    #[test]
    fn unresolved_keeps_the_attempted_key() {
        let rules = LinkageRules::recall_2025();
        let reg = registry(&rules);
        let resolver = Resolver::new(&rules, &reg, &[]).unwrap();
        let res = resolver.resolve(&CunliKey::new("中正區", "不存在里"), TAIPEI_CASE);
        match res {
            Resolution::Unresolved(u) => {
                assert_eq!(u.county.as_deref(), Some("台北市"));
                assert_eq!(
                    u.key_tried.map(|k| k.to_string()),
                    Some("台北市_中正區_不存在里".to_string())
                );
            }
            x => panic!("unexpected {:?}", x),
        }
        let res = resolver.resolve(&CunliKey::new("中正區", "建國里"), "無法辨識");
        assert!(matches!(
            res,
            Resolution::Unresolved(UnresolvedVillage { key_tried: None, .. })
        ));
    }

    #[test]
    fn manual_override_takes_precedence() {
        let rules = LinkageRules::recall_2025();
        let reg = registry(&rules);
        let o = ManualOverride {
            cunli_key: "中正區_建國里".to_string(),
            codes: vec!["12345678901".to_string(), "12345678902".to_string()],
            county: "台北市".to_string(),
            district: "中正區".to_string(),
            village: "建國里".to_string(),
            note: None,
        };
        let resolver = Resolver::new(&rules, &reg, &[o]).unwrap();
        let res = resolver.resolve(&CunliKey::new("中正區", "建國里"), TAIPEI_CASE);
        match res {
            Resolution::Resolved {
                code,
                associated,
                source,
            } => {
                assert_eq!(source, CodeSource::Manual);
                assert_eq!(code.code, "12345678901");
                assert_eq!(code.county_code, "123");
                assert_eq!(code.district_code, "123456");
                assert_eq!(associated.len(), 2);
            }
            x => panic!("unexpected {:?}", x),
        }
    }

    #[test]
    fn manual_override_known_code_uses_registry_names() {
        let rules = LinkageRules::recall_2025();
        let reg = registry(&rules);
        let o = ManualOverride {
            cunli_key: "永和區_光復里".to_string(),
            codes: vec!["65000040036".to_string()],
            county: "新北市".to_string(),
            district: "永和區".to_string(),
            village: "光復里".to_string(),
            note: None,
        };
        let resolver = Resolver::new(&rules, &reg, &[o]).unwrap();
        let res = resolver.resolve(&CunliKey::new("永和區", "光復里"), "");
        let c = res.code().unwrap();
        assert_eq!(c.county_code, "65000");
        assert_eq!(c.district_code, "65000040");
    }

    #[test]
    fn empty_override_is_rejected() {
        let rules = LinkageRules::recall_2025();
        let reg = registry(&rules);
        let o = ManualOverride {
            cunli_key: "東區_光復里".to_string(),
            codes: vec!["".to_string()],
            county: "新竹市".to_string(),
            district: "東區".to_string(),
            village: "光復里".to_string(),
            note: None,
        };
        assert_eq!(
            Resolver::new(&rules, &reg, &[o]).err(),
            Some(LinkageError::EmptyOverride("東區_光復里".to_string()))
        );
    }

    #[test]
    fn duplicate_override_keeps_the_last_entry() {
        let rules = LinkageRules::recall_2025();
        let reg = registry(&rules);
        let first = ManualOverride {
            cunli_key: "東區_光復里".to_string(),
            codes: vec!["10018010001".to_string()],
            county: "新竹市".to_string(),
            district: "東區".to_string(),
            village: "光復里".to_string(),
            note: None,
        };
        let second = ManualOverride {
            codes: vec!["10018010099".to_string()],
            ..first.clone()
        };
        let resolver = Resolver::new(&rules, &reg, &[first, second]).unwrap();
        assert_eq!(resolver.num_overrides(), 1);
        let res = resolver.resolve(&CunliKey::new("東區", "光復里"), "");
        assert_eq!(res.associated_codes(), &["10018010099".to_string()]);
    }

    #[test]
    fn exact_spelling_wins_over_variant() {
        let rules = LinkageRules::recall_2025();
        let reg = CodeRegistry::from_codes(
            vec![
                code("00000000001", "臺東縣", "臺東市", "中正里"),
                code("00000000002", "台東縣", "台東市", "中正里"),
            ],
            &rules,
        );
        let k = VillageKey::new("台東縣", "台東市", "中正里");
        assert_eq!(reg.lookup(&k).unwrap().code, "00000000002");
        let k = VillageKey::new("台東縣", "臺東市", "中正里");
        assert_eq!(reg.lookup(&k).unwrap().code, "00000000001");
    }
}
