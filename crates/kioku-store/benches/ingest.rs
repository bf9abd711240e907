use criterion::{Criterion, criterion_group, criterion_main};

use kioku_core::tokenizer::{SentenceRecord, SourceMeta, Token};
use kioku_store::{Ingestor, Store};

fn synthetic_record(i: usize) -> SentenceRecord {
    // Cycle a small vocabulary so atoms repeat across sentences.
    let words = ["猫", "犬", "鳥", "魚", "空", "海", "山", "川"];
    let readings = ["ネコ", "イヌ", "トリ", "サカナ", "ソラ", "ウミ", "ヤマ", "カワ"];
    let tokens: Vec<Token> = (0..4)
        .map(|j| {
            let k = (i + j * 3) % words.len();
            Token {
                surface: words[k].to_string(),
                base: words[k].to_string(),
                disambiguator: "名詞,一般".to_string(),
                grammar: None,
                pronunciation: Some(readings[k].to_string()),
            }
        })
        .collect();
    let text: String = tokens.iter().map(|t| t.surface.as_str()).collect();
    let text = format!("{text}{i}");
    let mut tokens = tokens;
    tokens.push(Token {
        surface: i.to_string(),
        base: i.to_string(),
        disambiguator: "名詞,数".to_string(),
        grammar: None,
        pronunciation: None,
    });
    SentenceRecord::assemble(SourceMeta::default(), text, tokens).unwrap()
}

fn bench_ingest(c: &mut Criterion) {
    let records: Vec<SentenceRecord> = (0..200).map(synthetic_record).collect();

    c.bench_function("ingest_200_sentences", |b| {
        b.iter(|| {
            let store = Store::open_in_memory().unwrap();
            let mut ingestor = Ingestor::new(&store);
            for record in &records {
                ingestor.ingest(record).unwrap();
            }
            ingestor.finish().unwrap()
        })
    });
}

criterion_group!(benches, bench_ingest);
criterion_main!(benches);
