use std::collections::BTreeSet;

/// Key partition of two indexed sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub common: BTreeSet<String>,
    pub only_a: BTreeSet<String>,
    pub only_b: BTreeSet<String>,
}

/// Split two key sets into `A ∩ B`, `A − B` and `B − A`.
pub fn partition(keys_a: &BTreeSet<String>, keys_b: &BTreeSet<String>) -> Partition {
    Partition {
        common: keys_a.intersection(keys_b).cloned().collect(),
        only_a: keys_a.difference(keys_b).cloned().collect(),
        only_b: keys_b.difference(keys_a).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(keys: &[&str]) -> BTreeSet<String> {
        keys.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn basic_partition() {
        let p = partition(&set(&["po_1", "po_2", "po_3"]), &set(&["po_2", "po_3", "po_4"]));
        assert_eq!(p.common, set(&["po_2", "po_3"]));
        assert_eq!(p.only_a, set(&["po_1"]));
        assert_eq!(p.only_b, set(&["po_4"]));
    }

    #[test]
    fn empty_sides() {
        let p = partition(&set(&["1"]), &set(&[]));
        assert!(p.common.is_empty());
        assert_eq!(p.only_a, set(&["1"]));
        assert!(p.only_b.is_empty());

        let p = partition(&set(&[]), &set(&[]));
        assert_eq!(p, Partition::default());
    }

    #[test]
    fn disjoint_sets() {
        let p = partition(&set(&["a"]), &set(&["b"]));
        assert!(p.common.is_empty());
        assert_eq!(p.only_a, set(&["a"]));
        assert_eq!(p.only_b, set(&["b"]));
    }
}
