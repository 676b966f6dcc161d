// ============================================================
// Layer 5 — Built-in Task Catalogue
// ============================================================
// Every task name the crate knows out of the box, grouped the
// way the corpora are laid out on disk:
//
//   GLUE-style      delimited files, one config per corpus
//   Edge probing    edges/<corpus>/ JSON-lines + labels.txt
//   Streaming       LM, ranking, pair classification, seq2seq
//   Grounded        captions paired with image ids
//
// Column numbers below are the corpora's published layouts.
//
// Reference: Rust Book §5 (Structs), §13 (Closures)

use crate::data::tsv::TsvSpec;
use crate::domain::split::Split;
use crate::tasks::{
    classification::{ClassificationConfig, Scoring, NLI_LABELS},
    grounded::CaptionSource,
    lm::LmCorpus,
    registry::{RegistryBuilder, TaskDefinition, TaskRegistry},
    regression::{RegressionConfig, RegressionScoring},
    seq2seq::Seq2SeqFormat,
    streaming_pair::{PairFormat, PairObjective},
    tagging::TaggingConfig,
    TaskOptions,
};

const BINARY_ENTAILMENT: [(&str, i64); 2] = [("not_entailment", 0), ("entailment", 1)];
const NUMERIC_NLI: [(&str, i64); 3] = [("0", 0), ("1", 1), ("2", 2)];
const MNLI_GENRES: [&str; 5] = ["fiction", "slate", "government", "telephone", "travel"];

pub fn builtin() -> TaskRegistry {
    let mut builder = TaskRegistry::builder();
    register_glue(&mut builder);
    register_probing(&mut builder);
    register_edges(&mut builder);
    register_streaming(&mut builder);
    builder.build()
}

fn classification(builder: &mut RegistryBuilder, name: &str, rel_path: &str, config: ClassificationConfig) {
    builder.register(name, rel_path, TaskDefinition::Classification(config), TaskOptions::new());
}

/// train.tsv / dev.tsv with labels, test.tsv with an id column instead
fn labelled_train_dev(n_classes: usize, labelled: TsvSpec, test: TsvSpec) -> ClassificationConfig {
    ClassificationConfig::new(n_classes)
        .split(Split::Train, "train.tsv", labelled.clone())
        .split(Split::Val, "dev.tsv", labelled)
        .split(Split::Test, "test.tsv", test)
}

// ─── GLUE-style ───────────────────────────────────────────────────────────────
fn register_glue(builder: &mut RegistryBuilder) {
    classification(
        builder,
        "sst",
        "SST-2/",
        labelled_train_dev(2, TsvSpec::single(0).target(1).skip(1), TsvSpec::single(1).index(0).skip(1)),
    );
    classification(
        builder,
        "cola",
        "CoLA/",
        labelled_train_dev(2, TsvSpec::single(3).target(1), TsvSpec::single(1).index(0).skip(1))
            .scoring(Scoring::MccAccuracy),
    );

    for name in ["qqp", "qqp-alt"] {
        let config = labelled_train_dev(2, TsvSpec::pair(3, 4).target(5).skip(1), TsvSpec::pair(1, 2).index(0).skip(1))
            .scoring(Scoring::AccuracyF1);
        classification(builder, name, "QQP/", config);
    }
    classification(
        builder,
        "mrpc",
        "MRPC/",
        labelled_train_dev(2, TsvSpec::pair(3, 4).target(0).skip(1), TsvSpec::pair(3, 4).index(0).skip(1))
            .scoring(Scoring::AccuracyF1),
    );

    for name in ["mnli", "mnli-alt"] {
        classification(builder, name, "MNLI/", mnli());
    }
    for genre in MNLI_GENRES {
        builder.register(
            &format!("mnli-{genre}"),
            "MNLI/",
            TaskDefinition::Classification(mnli_genre()),
            TaskOptions::new().genre(genre),
        );
    }
    builder.register("mnli-diagnostic", "MNLI/", TaskDefinition::Diagnostic, TaskOptions::new());

    for name in ["sts-b", "sts-b-alt"] {
        let labelled = TsvSpec::pair(7, 8).target(9).scores(5.0).skip(1);
        let config = RegressionConfig::new(RegressionScoring::Correlation)
            .split(Split::Train, "train.tsv", labelled.clone())
            .split(Split::Val, "dev.tsv", labelled)
            .split(Split::Test, "test.tsv", TsvSpec::pair(7, 8).index(0).skip(1).scores(5.0));
        builder.register(name, "STS-B/", TaskDefinition::Regression(config), TaskOptions::new());
    }

    let joci = TsvSpec::pair(0, 1).target(2).scores(1.0).skip(1);
    let config = RegressionConfig::new(RegressionScoring::OrdinalMse)
        .split(Split::Train, "train.tsv", joci.clone())
        .split(Split::Val, "dev.tsv", joci.clone())
        .split(Split::Test, "test.tsv", joci);
    builder.register("joci", "JOCI/", TaskDefinition::Regression(config), TaskOptions::new());

    classification(
        builder,
        "snli",
        "SNLI/",
        labelled_train_dev(
            3,
            TsvSpec::pair(7, 8).target(-1).label_map(&NLI_LABELS).skip(1),
            TsvSpec::pair(7, 8).index(0).skip(1),
        ),
    );

    for (name, rel_path) in [("rte", "RTE/"), ("qnli", "QNLI/"), ("qnli-alt", "QNLI/")] {
        let config = labelled_train_dev(
            2,
            TsvSpec::pair(1, 2).target(3).label_map(&BINARY_ENTAILMENT).skip(1),
            TsvSpec::pair(1, 2).index(0).skip(1),
        );
        classification(builder, name, rel_path, config);
    }
    classification(
        builder,
        "wnli",
        "WNLI/",
        labelled_train_dev(2, TsvSpec::pair(1, 2).target(3).skip(1), TsvSpec::pair(1, 2).index(0).skip(1)),
    );

    let ccg = TaggingConfig::two_column(1363, "ccg_1363.train", "ccg_1363.dev", "ccg_1363.test");
    builder.register("ccg", "CCG/", TaskDefinition::Tagging(ccg), TaskOptions::new());
}

fn mnli() -> ClassificationConfig {
    let dev = TsvSpec::pair(8, 9).target(15).label_map(&NLI_LABELS).skip(1);
    let test = TsvSpec::pair(8, 9).index(0).skip(1);
    ClassificationConfig::new(3)
        .split(Split::Train, "train.tsv", TsvSpec::pair(8, 9).target(11).label_map(&NLI_LABELS).skip(1))
        .split(Split::Val, "dev_matched.tsv", dev.clone())
        .split(Split::Val, "dev_mismatched.tsv", dev)
        .split(Split::Test, "test_matched.tsv", test.clone())
        .split(Split::Test, "test_mismatched.tsv", test)
        .split(Split::Test, "diagnostic.tsv", TsvSpec::pair(1, 2).index(0).skip(1))
}

/// Matched files only; the genre filter comes from the registered options
fn mnli_genre() -> ClassificationConfig {
    let labelled = TsvSpec::pair(8, 9).target(11).label_map(&NLI_LABELS).index(0).skip(1);
    ClassificationConfig::new(3)
        .split(Split::Train, "train.tsv", labelled.clone())
        .split(Split::Val, "dev_matched.tsv", labelled)
        .split(Split::Test, "test_matched.tsv", TsvSpec::pair(8, 9).index(0).skip(1))
}

// ─── Probing sets ─────────────────────────────────────────────────────────────
/// Placeholder train/test files around a single probing validation file
fn probe(val_file: &str, val: TsvSpec) -> ClassificationConfig {
    let dummy = TsvSpec::pair(1, 2);
    ClassificationConfig::new(3)
        .split(Split::Train, "train_dummy.tsv", dummy.clone())
        .split(Split::Val, val_file, val)
        .split(Split::Test, "test_dummy.tsv", dummy)
}

fn register_probing(builder: &mut RegistryBuilder) {
    let probe_default = TaskOptions::new().probe_path("probe_dummy.tsv");
    builder.register(
        "nli-prob",
        "NLI-Prob/",
        TaskDefinition::Classification(probe("probe_dummy.tsv", TsvSpec::pair(0, 1).target(2).label_map(&NLI_LABELS))),
        probe_default.clone(),
    );
    builder.register(
        "nli-alt",
        "NLI-Prob/",
        TaskDefinition::Classification(probe(
            "probe_dummy.tsv",
            TsvSpec::pair(9, 10).target(1).label_map(&NUMERIC_NLI).index(0).skip(1),
        )),
        probe_default,
    );
    classification(
        builder,
        "nli-prob-negation",
        "NLI-Prob/",
        probe("lexnegs.tsv", TsvSpec::pair(8, 9).target(10).label_map(&NLI_LABELS).skip(1)),
    );
    classification(
        builder,
        "nli-prob-prepswap",
        "NLI-Prob/",
        probe("all.prepswap.turk.newlabels.tsv", TsvSpec::pair(8, 9).target(0)),
    );
    classification(
        builder,
        "nps",
        "nps/",
        probe("dev.tsv", TsvSpec::pair(0, 1).target(2).label_map(&NLI_LABELS)),
    );

    for (name, rel_path) in [
        ("recast-puns", "DNC/recast_puns_data"),
        ("recast-ner", "DNC/recast_ner_data"),
        ("recast-verbnet", "DNC/recast_verbnet_data"),
        ("recast-verbcorner", "DNC/recast_verbcorner_data"),
        ("recast-sentiment", "DNC/recast_sentiment_data"),
        ("recast-factuality", "DNC/recast_factuality_data"),
        ("recast-winogender", "DNC/manually-recast-winogender"),
        ("recast-lexicosyntax", "DNC/lexicosyntactic_recasted"),
        ("recast-kg", "DNC/kg-relations"),
    ] {
        // dev files drop the leading id column
        let config = ClassificationConfig::new(2)
            .split(Split::Train, "train.tsv", TsvSpec::pair(1, 2).target(3))
            .split(Split::Val, "dev.tsv", TsvSpec::pair(0, 1).target(3))
            .split(Split::Test, "test.tsv", TsvSpec::pair(1, 2).target(3));
        classification(builder, name, rel_path, config);
    }

    let weak = TsvSpec::pair(0, 1).target(2).label_map(&[("0", 0), ("1", 1)]);
    classification(
        builder,
        "weakgrounded",
        "mscoco/weakgrounded/",
        ClassificationConfig::new(2).all_splits("train_aug.tsv", "val.tsv", "test.tsv", weak),
    );
}

// ─── Edge probing ─────────────────────────────────────────────────────────────
/// `{stem}.edges.json` naming used by most converted corpora
fn edges_json(stem: &str) -> String {
    format!("{stem}.edges.json")
}

fn register_edges(builder: &mut RegistryBuilder) {
    let standard = [edges_json("train"), edges_json("dev"), edges_json("test")];
    let by_affix = |pre: &str, post: &str| ["train", "dev", "test"].map(|s| format!("{pre}{s}{post}"));

    let table: Vec<(&str, &str, [String; 3], bool)> = vec![
        ("srl-conll2005", "edges/srl_conll2005", [edges_json("train"), edges_json("dev"), edges_json("test.wsj")], false),
        ("srl-conll2012", "edges/srl_conll2012", standard.clone(), false),
        ("spr1", "edges/spr1", by_affix("spr1.", ".json"), false),
        ("spr2", "edges/spr2", standard.clone(), false),
        ("dpr", "edges/dpr", standard.clone(), false),
        ("coref-ontonotes", "edges/ontonotes-coref", standard.clone(), false),
        ("coref-ontonotes-conll", "edges/ontonotes-coref-conll", by_affix("coref_conll_ontonotes_en_", ".json"), false),
        ("ner-conll2003", "edges/ner_conll2003", by_affix("CoNLL-2003_", ".json"), true),
        ("ner-ontonotes", "edges/ontonotes-ner", by_affix("ner_ontonotes_en_", ".json"), true),
        ("dep-labeling", "edges/dep", by_affix("", ".json"), false),
        ("dep-labeling-ewt", "edges/dep_ewt", standard, false),
        ("constituent-ptb", "edges/ptb-membership", by_affix("ptb_", ".json"), true),
        ("constituent-ontonotes", "edges/ontonotes-constituents", by_affix("consts_ontonotes_en_", ".json"), true),
        ("ccg-tag", "edges/ccg_tag", by_affix("ccg.tag.", ".json"), true),
        ("ccg-parse", "edges/ccg_parse", by_affix("ccg.parse.", ".json"), true),
    ];

    for (name, rel_path, [train, val, test], single_sided) in table {
        let mut opts = TaskOptions::new().label_file("labels.txt").files(&train, &val, &test);
        if single_sided {
            opts = opts.single_sided();
        }
        builder.register(&format!("edges-{name}"), rel_path, TaskDefinition::EdgeProbing, opts);
    }
}

// ─── Streaming and grounded ───────────────────────────────────────────────────
fn register_streaming(builder: &mut RegistryBuilder) {
    let none = TaskOptions::new;

    builder.register("wiki103", "WikiText103/", TaskDefinition::LanguageModeling(LmCorpus::WikiText), none());
    builder.register("bwb", "BWB/", TaskDefinition::LanguageModeling(LmCorpus::Plain), none());

    let pair = |format, objective| TaskDefinition::StreamingPair { format, objective };
    let classify = PairObjective::Classification { n_classes: 2 };

    for (name, rel_path) in [
        ("reddit", "Reddit_2008/"),
        ("reddit_dummy", "Reddit_2008_TestSample/"),
        ("reddit_3.4G", "Reddit_3.4G/"),
        ("reddit_13G", "Reddit_13G/"),
        ("reddit_softmax", "Reddit_2008/"),
    ] {
        builder.register(name, rel_path, pair(PairFormat::Reddit, PairObjective::Ranking), none());
    }
    for (name, rel_path) in [
        ("reddit_pair_classif", "Reddit_2008/"),
        ("reddit_pair_classif_dummy", "Reddit_2008_TestSample/"),
        ("reddit_pair_classif_3.4G", "Reddit_3.4G/"),
    ] {
        builder.register(name, rel_path, pair(PairFormat::Reddit, classify), none());
    }
    builder.register("mt_pair_classif", "wmt14_en_de_local/", pair(PairFormat::Bitext, classify), none());
    builder.register("mt_pair_classif_dummy", "wmt14_en_de_mini/", pair(PairFormat::Bitext, classify), none());
    builder.register("wiki103_classif", "WikiText103/", pair(PairFormat::ConsecutiveSentences, classify), none());
    builder.register(
        "dissentwikifullbig",
        "DisSent/wikitext/",
        pair(PairFormat::DisSent, PairObjective::Classification { n_classes: 8 }),
        none().prefix("wikitext.dissent.big"),
    );

    for (name, rel_path, vocab) in [
        ("wmt_debug", "wmt_debug/", 5000),
        ("wmt17_en_ru", "wmt17_en_ru/", 20000),
        ("wmt14_en_de", "wmt14_en_de/", 20000),
    ] {
        builder.register(name, rel_path, TaskDefinition::Seq2Seq(Seq2SeqFormat::TwoColumn), none().max_targ_v_size(vocab));
    }
    for (name, rel_path) in [
        ("reddit_s2s", "Reddit_2008/"),
        ("reddit_s2s_3.4G", "Reddit_3.4G/"),
        ("reddit_s2s_dummy", "Reddit_2008_TestSample/"),
    ] {
        builder.register(name, rel_path, TaskDefinition::Seq2Seq(Seq2SeqFormat::Reddit), none().max_targ_v_size(0));
    }
    builder.register(
        "wiki103_s2s",
        "WikiText103/",
        TaskDefinition::Seq2Seq(Seq2SeqFormat::SkipThought),
        none().max_targ_v_size(0),
    );

    builder.register("grounded", "mscoco/grounded/", TaskDefinition::Grounded(CaptionSource::Mscoco), none());
    builder.register("groundedsw", "mscoco/grounded", TaskDefinition::Grounded(CaptionSource::ShapeWorld), none());
}
