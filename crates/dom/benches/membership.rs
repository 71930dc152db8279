use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use dom::{DomArena, NodeId, SelectorList};

/// Balanced tree of `depth` levels with `fan_out` children per element
fn build(arena: &DomArena, depth: usize, fan_out: usize) -> (NodeId, NodeId) {
    let root = arena.create_element("div");
    let mut frontier = vec![root];
    let mut deepest = root;

    for level in 0..depth {
        let mut next = Vec::with_capacity(frontier.len() * fan_out);
        for &parent in &frontier {
            for i in 0..fan_out {
                let child = arena.create_element(if level % 2 == 0 { "section" } else { "p" });
                if i == 0 {
                    let _ = arena.put(child, dom::Field::AddClass("first".to_string()));
                }
                arena.append_child(parent, child).expect("append");
                deepest = child;
                next.push(child);
            }
        }
        frontier = next;
    }

    (root, deepest)
}

fn bench_membership(c: &mut Criterion) {
    let arena = DomArena::new();
    let (root, deepest) = build(&arena, 6, 4);

    c.bench_function("contains_deep", |b| {
        b.iter(|| arena.contains(black_box(root), black_box(deepest)).expect("contains"))
    });

    c.bench_function("append_remove_leaf", |b| {
        b.iter_batched(
            || arena.create_element("span"),
            |leaf| {
                arena.append_child(deepest, leaf).expect("append");
                arena.remove_child(deepest, leaf).expect("remove");
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_selectors(c: &mut Criterion) {
    let arena = DomArena::new();
    let (root, _) = build(&arena, 5, 4);
    let list = SelectorList::compile("section > p.first ~ p").expect("compile");

    c.bench_function("compile", |b| {
        b.iter(|| SelectorList::compile(black_box("div#main > p.note:not([hidden]), ul li")))
    });

    c.bench_function("select_all", |b| {
        b.iter(|| arena.select(black_box(root), &list).expect("select"))
    });
}

criterion_group!(benches, bench_membership, bench_selectors);
criterion_main!(benches);
