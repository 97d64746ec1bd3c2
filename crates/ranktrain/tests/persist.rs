//! Saving and loading trained models.

mod common;

use approx::assert_abs_diff_eq;
use rstest::rstest;

use ranktrain::persist::{self, load_model, save_model, ArtifactFormat, PersistError};
use ranktrain::schema::SchemaError;
use ranktrain::{FeatureSchema, RankerTrainer, RankingModel};

use common::{fast_config, synthetic_set};

fn trained() -> (RankingModel, ranktrain::data::TrainingSet) {
    let set = synthetic_set(25, 8, 23);
    let model = RankerTrainer::new(fast_config(12)).unwrap().train(&set).unwrap();
    (model, set)
}

#[rstest]
#[case::lightgbm(ArtifactFormat::LightGbmText, "model.txt")]
#[case::json(ArtifactFormat::Json, "model.json")]
fn reloaded_model_predicts_identically(#[case] format: ArtifactFormat, #[case] name: &str) {
    let (model, set) = trained();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);

    save_model(&model, &path, format).unwrap();
    let loaded = load_model(&path).unwrap();

    assert_eq!(loaded.n_trees(), model.n_trees());
    assert_eq!(loaded.schema(), model.schema());
    let expected = model.predict(set.features()).unwrap();
    let actual = loaded.predict(set.features()).unwrap();
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert_abs_diff_eq!(a, e, epsilon = 1e-12);
    }
}

#[test]
fn json_artifact_keeps_config_and_history() {
    let (model, _) = trained();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    save_model(&model, &path, ArtifactFormat::Json).unwrap();

    let loaded = load_model(&path).unwrap();
    assert_eq!(loaded.config(), model.config());
    assert_eq!(loaded.meta(), model.meta());
}

#[test]
fn lightgbm_text_layout() {
    let (model, _) = trained();
    let text = String::from_utf8(persist::encode(&model, ArtifactFormat::LightGbmText).unwrap())
        .unwrap();

    let header: Vec<&str> = text.lines().take(6).collect();
    assert_eq!(
        header,
        [
            "tree",
            "version=v4",
            "num_class=1",
            "num_tree_per_iteration=1",
            "label_index=0",
            "max_feature_idx=6",
        ]
    );
    assert!(text.contains("\nfeature_names=f0_similarity f1_rank_score f2_authority"));
    assert!(text.contains("\nend of trees\n"));
    assert!(text.contains("\n[objective: lambdarank]\n"));
    assert!(text.contains("\n[feature_schema: retrieval-v1]\n"));
    assert!(text.trim_end().ends_with("pandas_categorical:null"));

    // tree_sizes are the byte lengths of the Tree=N blocks.
    let sizes: Vec<usize> = text
        .lines()
        .find_map(|l| l.strip_prefix("tree_sizes="))
        .unwrap()
        .split_whitespace()
        .map(|s| s.parse().unwrap())
        .collect();
    assert_eq!(sizes.len(), model.n_trees());
    let mut offset = text.find("Tree=0\n").unwrap();
    for (i, size) in sizes.iter().enumerate() {
        assert!(text[offset..].starts_with(&format!("Tree={i}\n")));
        offset += size;
    }
    assert!(text[offset..].starts_with("end of trees"));
}

#[test]
fn loaded_model_with_other_feature_order_is_rejected() {
    let (model, _) = trained();
    let mut features: Vec<String> = model.schema().features().to_vec();
    features.swap(0, 1);
    let reordered = FeatureSchema::new("retrieval-v1", features).unwrap();

    let err = model.check_schema(&reordered).unwrap_err();
    assert!(matches!(err, SchemaError::FeatureOrder { .. }));
}

#[test]
fn garbage_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.txt");
    std::fs::write(&path, "tree\nversion=v4\n").unwrap();
    assert!(matches!(load_model(&path), Err(PersistError::Parse(_))));
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load_model(&dir.path().join("nope.txt")),
        Err(PersistError::Read { .. })
    ));
}
