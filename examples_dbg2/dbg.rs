fn main() {
    let text = "name: jack\nage: 22\n";
    let stream = yaml_language_service::parser::parse(text);
    let doc = &stream.documents[0];
    let root = doc.root.unwrap();
    let node = doc.node(root);
    println!("root offset={} length={} end={}", node.offset, node.length, node.end());
    doc.visit(root, &mut |id| {
        let n = doc.node(id);
        println!("{:?} offset={} len={} end={}", n.kind, n.offset, n.length, n.end());
        true
    });
}
