//! End-to-end matcher scenarios on tensors as the host hands them over.

use tensorcv_core::matcher::threshold_from_host;
use tensorcv_core::{BinaryMatcher, DescriptorSet, Error, MatchOptions, SearchRange, Tensor};

fn descriptors(rows: &[[u8; 8]]) -> DescriptorSet {
    let data: Vec<u8> = rows.iter().flatten().copied().collect();
    let tensor = Tensor::new(data, vec![rows.len(), 8]).unwrap();
    DescriptorSet::from_tensor(&tensor).unwrap()
}

#[test]
fn test_zero_against_zero_and_ones() {
    let set1 = descriptors(&[[0x00; 8]]);
    let set2 = descriptors(&[[0x00; 8], [0xFF; 8]]);

    let report = BinaryMatcher::default().run(&set1, &set2, 5).unwrap();
    assert_eq!(report.pairs(), vec![(0, 0)]);
    assert_eq!(report.count(), 1);

    let report = BinaryMatcher::default().run(&set1, &set2, 0).unwrap();
    assert_eq!(report.count(), 0);
}

#[test]
fn test_tie_and_restricted_range() {
    let mut low = [0u8; 8];
    low[0] = 0x0F;
    let mut high = [0u8; 8];
    high[0] = 0xF0;
    let set1 = descriptors(&[low, high]);
    let set2 = descriptors(&[low, low]);

    let report = BinaryMatcher::default().run(&set1, &set2, 9).unwrap();
    assert_eq!(report.pairs(), vec![(0, 0), (1, 1)]);
    assert_eq!(report.matches[1].distance, 8);

    let table = report.to_tensor().unwrap();
    assert_eq!(table.shape(), &[2, 2]);
}

#[test]
fn test_threshold_is_exclusive() {
    let mut one_bit = [0u8; 8];
    one_bit[7] = 0x80;
    let set1 = descriptors(&[[0; 8]]);
    let set2 = descriptors(&[one_bit]);
    assert_eq!(BinaryMatcher::default().run(&set1, &set2, 1).unwrap().count(), 0);
    assert_eq!(BinaryMatcher::default().run(&set1, &set2, 2).unwrap().count(), 1);
}

#[test]
fn test_self_match_accepts_diagonal() {
    let rows: Vec<[u8; 8]> = (0..16u64).map(|i| (i * 0x0101_0101).to_le_bytes()).collect();
    let set = descriptors(&rows);
    let report = BinaryMatcher::default().run(&set, &set, 1).unwrap();
    assert_eq!(report.count(), rows.len());
    for m in &report.matches {
        assert_eq!(m.query, m.train);
        assert_eq!(m.distance, 0);
    }
}

#[test]
fn test_multi_word_descriptors() {
    let a = DescriptorSet::new(vec![0u8; 64], 32).unwrap();
    let mut flipped = vec![0u8; 32];
    flipped[31] = 0x01;
    flipped[0] = 0x01;
    let b = DescriptorSet::from_rows(32, &[flipped, vec![0xFF; 32]]).unwrap();
    let report = BinaryMatcher::new(MatchOptions {
        search_range: SearchRange::Full,
        parallel: false,
    })
    .run(&a, &b, 3)
    .unwrap();
    assert_eq!(report.pairs(), vec![(0, 0), (1, 0)]);
    assert!(report.matches.iter().all(|m| m.distance == 2));
}

#[test]
fn test_invalid_inputs_are_typed_errors() {
    let t = Tensor::new(vec![0u8; 24], vec![2, 12]).unwrap();
    assert!(matches!(
        DescriptorSet::from_tensor(&t),
        Err(Error::InvalidDescriptorLength(12))
    ));

    let a = DescriptorSet::new(vec![0; 8], 8).unwrap();
    let b = DescriptorSet::new(vec![0; 32], 32).unwrap();
    assert!(matches!(
        BinaryMatcher::default().run(&a, &b, 4),
        Err(Error::DimensionMismatch { .. })
    ));

    assert!(matches!(threshold_from_host(-5), Err(Error::InvalidThreshold(-5))));
}
