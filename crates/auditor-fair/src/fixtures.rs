//! Test datasets where the sensitive group leaks into a feature.

use rand::Rng;

use auditor_data::split::rng_from;
use auditor_data::{FeatureMatrix, PreparedDataset};

/// Features `[proxy, a]`. `proxy` is 1 for "Male" and 0 for "Female" plus
/// uniform noise in ±0.3, `a` is uniform. Labels are `a + 0.4·[male] > 0.7`,
/// so the groups' positive rates are about 0.7 and 0.3 and a tree that
/// splits on `proxy` reproduces that gap.
pub(crate) fn proxy_dataset(n: usize, seed: u64) -> PreparedDataset {
    let mut rng = rng_from(Some(seed));
    let mut data = Vec::with_capacity(2 * n);
    let mut labels = Vec::with_capacity(n);
    let mut groups = Vec::with_capacity(n);

    for _ in 0..n {
        let male = rng.gen_bool(0.5);
        let proxy = f64::from(u8::from(male)) + rng.gen_range(-0.3..0.3);
        let a: f64 = rng.gen();
        data.extend([proxy, a]);
        labels.push(usize::from(a + if male { 0.4 } else { 0.0 } > 0.7));
        groups.push(if male { "Male" } else { "Female" }.to_string());
    }

    PreparedDataset {
        features: FeatureMatrix::from_vec(n, 2, data).expect("two values per row"),
        feature_names: vec!["proxy".to_string(), "a".to_string()],
        labels,
        groups,
        sensitive_column: "sex".to_string(),
        target_column: "y".to_string(),
        classes: vec!["0".to_string(), "1".to_string()],
        raw_rows: n,
    }
}
