use std::io::Cursor;

use munch::{
    CompiledTable, Dfa, Lexeme, Position, Rule, ScanError, Scanner, ScannerConfig, Source, State,
    Transition, build,
    dfa::{minimize_traced, union},
};

const NUM: u32 = 1;
const WORD: u32 = 2;
const ARROW: u32 = 3;
const MINUS: u32 = 4;
const SPACE: u32 = 5;

fn plus(label: u32, class: &[u8]) -> Rule {
    Rule::from_transitions(
        label,
        class
            .iter()
            .flat_map(|&c| [Transition::new(0, c, 1), Transition::new(1, c, 1)]),
        0,
        [State::index(1)],
    )
    .unwrap()
}

fn literal(label: u32, word: &[u8]) -> Rule {
    Rule::from_transitions(
        label,
        word.iter()
            .zip(0_u32..)
            .map(|(&c, i)| Transition::new(i, c, i + 1)),
        0,
        [State::index(u32::try_from(word.len()).unwrap())],
    )
    .unwrap()
}

fn table() -> CompiledTable {
    build(&[
        plus(NUM, b"0123456789"),
        plus(WORD, b"abcdefghijklmnopqrstuvwxyz"),
        literal(ARROW, b"->"),
        literal(MINUS, b"-"),
        plus(SPACE, b" \n"),
    ])
    .unwrap()
}

fn texts(lexemes: &[Lexeme]) -> Vec<(u32, String)> {
    lexemes
        .iter()
        .map(|l| (l.label, l.text_lossy().into_owned()))
        .collect()
}

#[test]
fn scans_a_small_language() {
    let table = table();
    let lexemes: Vec<_> = Scanner::new(&table, [Source::reader(Cursor::new("ab->12 - -x\n"))])
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(texts(&lexemes), [
        (WORD, "ab".to_owned()),
        (ARROW, "->".to_owned()),
        (NUM, "12".to_owned()),
        (SPACE, " ".to_owned()),
        (MINUS, "-".to_owned()),
        (SPACE, " ".to_owned()),
        (MINUS, "-".to_owned()),
        (WORD, "x".to_owned()),
        (SPACE, "\n".to_owned()),
    ]);
    assert_eq!(lexemes[2].position, Position {
        source: 0,
        offset: 4
    });
}

#[test]
fn skip_and_continue_over_unknown_bytes() {
    let table = table();
    let mut scanner = Scanner::with_config(
        &table,
        [
            Source::reader(Cursor::new("a?b")),
            Source::reader(Cursor::new("?")),
            Source::reader(Cursor::new("7")),
        ],
        ScannerConfig { buffer_size: 1 },
    )
    .unwrap();

    let mut good = Vec::new();
    let mut bad = Vec::new();
    loop {
        match scanner.next_lexeme() {
            Ok(l) => good.push(l),
            Err(ScanError::NoMatch { position, byte }) => bad.push((position, byte)),
            Err(ScanError::SourceExhausted) => break,
            Err(e) => panic!("{e}"),
        }
    }

    assert_eq!(texts(&good), [
        (WORD, "a".to_owned()),
        (WORD, "b".to_owned()),
        (NUM, "7".to_owned())
    ]);
    assert_eq!(good[2].position.source, 2);
    assert_eq!(bad, [
        (
            Position {
                source: 0,
                offset: 1
            },
            b'?'
        ),
        (
            Position {
                source: 1,
                offset: 0
            },
            b'?'
        ),
    ]);
}

#[test]
fn table_is_shared_across_threads() {
    let table = table();
    let inputs = ["12 ab", "x->y", "-- 3"];

    let counts: Vec<usize> = std::thread::scope(|s| {
        let handles: Vec<_> = inputs
            .iter()
            .map(|&input| {
                let table = &table;
                s.spawn(move || {
                    Scanner::new(table, [Source::reader(Cursor::new(input))])
                        .map(Result::unwrap)
                        .count()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(counts, [3, 3, 4]);
}

#[test]
fn textbook_minimization_through_the_public_api() {
    // A..E over {a, b}, accepting (a|b)*abb
    let st = |n: u32| State::new([10, n]);
    let t = |from, sym, to| Transition::new(st(from), sym, st(to));
    let dfa = Dfa::from_transitions(
        [
            t(0, b'a', 1),
            t(0, b'b', 2),
            t(1, b'a', 1),
            t(1, b'b', 3),
            t(2, b'a', 1),
            t(2, b'b', 2),
            t(3, b'a', 1),
            t(3, b'b', 4),
            t(4, b'a', 1),
            t(4, b'b', 2),
        ],
        st(0),
        [(st(4), 1)],
    )
    .unwrap();

    let m = minimize_traced(&dfa);
    assert_eq!(m.dfa.states().len(), 4);
    assert_eq!(m.division.block_of(&st(0)).unwrap().as_slice(), &[st(0), st(2)]);

    let again = minimize_traced(&m.dfa);
    assert_eq!(again.dfa, m.dfa);

    let table = CompiledTable::from_dfa(&m.dfa).unwrap();
    assert_eq!(table.run(b"babb"), Some(1));
    assert_eq!(table.run(b"abba"), None);
}

#[test]
fn union_is_exact_after_one_side_dies() {
    let a = literal(1, b"x").dfa.retag(|_, _| 1);
    let b = literal(2, b"xyz").dfa.retag(|_, _| 2);
    let u = union(&a, &b).compacted();

    assert_eq!(u.run(b"x"), Some(1));
    assert_eq!(u.run(b"xy"), None);
    assert_eq!(u.run(b"xyz"), Some(2));
}
