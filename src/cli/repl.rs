use crate::Database;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

pub struct Repl {
    db: Database,
}

impl Repl {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        let mut editor = DefaultEditor::new()?;

        println!("Limoncello Interactive Shell");
        println!("Type 'help' for commands, 'exit' to quit\n");

        loop {
            let readline = editor.readline("limoncello> ");
            match readline {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    editor.add_history_entry(line)?;

                    match self.execute_command(line) {
                        Ok(true) => continue,
                        Ok(false) => break,
                        Err(e) => eprintln!("Error: {}", e),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("exit");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                }
            }
        }

        self.db.sync()?;
        Ok(())
    }

    /// Run one command line. Returns `false` when the shell should exit.
    pub fn execute_command(&self, line: &str) -> anyhow::Result<bool> {
        let parts: Vec<&str> = line.split_whitespace().collect();

        if parts.is_empty() {
            return Ok(true);
        }

        match parts[0] {
            "help" => self.show_help(),
            "exit" | "quit" => return Ok(false),
            "collections" => self.list_collections(),
            "create" => self.create(&parts[1..])?,
            "drop" => self.drop_collection(&parts[1..])?,
            "ingest" => self.ingest(&parts[1..])?,
            "search" => self.search(&parts[1..])?,
            "get" => self.get(&parts[1..])?,
            "delete" => self.delete(&parts[1..])?,
            "count" => self.count(&parts[1..])?,
            "stats" => self.stats(),
            "compact" => {
                self.db.compact()?;
                println!("Database compacted");
            }
            "sync" => {
                self.db.sync()?;
                println!("Database synced to disk");
            }
            _ => {
                println!("Unknown command: {}. Type 'help' for available commands.", parts[0]);
            }
        }

        Ok(true)
    }

    fn show_help(&self) {
        println!("Available commands:");
        println!();
        println!("  help                                   - Show this help message");
        println!("  collections                            - List all collections");
        println!("  create <collection>                    - Create a collection");
        println!("  drop <collection>                      - Drop a collection and its documents");
        println!("  ingest <collection> <key> <text...>    - Embed text and store it under key");
        println!("  search <c1,c2,...> <n> <query...>      - Find the n most similar documents");
        println!("  get <collection> <key>                 - Show a stored embedding");
        println!("  delete <collection> <key>              - Delete a document");
        println!("  count <collection>                     - Count documents in collection");
        println!("  stats                                  - Show storage statistics");
        println!("  compact                                - Reclaim space from overwritten records");
        println!("  sync                                   - Sync database to disk");
        println!("  exit/quit                              - Exit the shell");
        println!();
        println!("Examples:");
        println!("  create articles");
        println!("  ingest articles intro Limoncello keeps embeddings on disk");
        println!("  search articles,notes 5 where are embeddings kept");
    }

    fn list_collections(&self) {
        let collections = self.db.list_collections();

        if collections.is_empty() {
            println!("No collections found");
            return;
        }

        println!("Collections:");
        for (name, count) in collections {
            println!("  {} ({} documents)", name, count);
        }
    }

    fn create(&self, args: &[&str]) -> anyhow::Result<()> {
        if args.len() != 1 {
            println!("Usage: create <collection>");
            return Ok(());
        }

        self.db.create_collection(args[0])?;
        println!("Collection '{}' created", args[0]);
        Ok(())
    }

    fn drop_collection(&self, args: &[&str]) -> anyhow::Result<()> {
        if args.len() != 1 {
            println!("Usage: drop <collection>");
            return Ok(());
        }

        self.db.drop_collection(args[0])?;
        println!("Collection '{}' dropped", args[0]);
        Ok(())
    }

    fn ingest(&self, args: &[&str]) -> anyhow::Result<()> {
        if args.len() < 3 {
            println!("Usage: ingest <collection> <key> <text...>");
            return Ok(());
        }

        let text = args[2..].join(" ");
        self.db.ingest(args[0], args[1], &text)?;
        println!("Document '{}' embedded", args[1]);
        Ok(())
    }

    fn search(&self, args: &[&str]) -> anyhow::Result<()> {
        if args.len() < 3 {
            println!("Usage: search <c1,c2,...> <n> <query...>");
            return Ok(());
        }

        let collections: Vec<&str> = args[0].split(',').filter(|c| !c.is_empty()).collect();
        let limit: usize = args[1]
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid result count: {}", args[1]))?;
        let query = args[2..].join(" ");

        let results = self.db.search(&collections, &query, limit)?;

        if results.is_empty() {
            println!("No results found");
            return Ok(());
        }

        println!("Found {} result(s):", results.len());
        for result in results {
            println!("  {}/{}  score: {:.6}", result.collection, result.key, result.score);
        }

        Ok(())
    }

    fn get(&self, args: &[&str]) -> anyhow::Result<()> {
        if args.len() != 2 {
            println!("Usage: get <collection> <key>");
            return Ok(());
        }

        match self.db.get_embedding(args[0], args[1])? {
            Some(vector) => {
                let preview: Vec<String> = vector.iter().take(8).map(|x| format!("{:.6}", x)).collect();
                println!(
                    "{} dimensions: [{}{}]",
                    vector.len(),
                    preview.join(", "),
                    if vector.len() > 8 { ", ..." } else { "" }
                );
            }
            None => println!("Document '{}' not found", args[1]),
        }

        Ok(())
    }

    fn delete(&self, args: &[&str]) -> anyhow::Result<()> {
        if args.len() != 2 {
            println!("Usage: delete <collection> <key>");
            return Ok(());
        }

        if self.db.delete(args[0], args[1])? {
            println!("Deleted document '{}'", args[1]);
        } else {
            println!("Document '{}' not found", args[1]);
        }

        Ok(())
    }

    fn count(&self, args: &[&str]) -> anyhow::Result<()> {
        if args.len() != 1 {
            println!("Usage: count <collection>");
            return Ok(());
        }

        let count = self.db.count(args[0])?;
        println!("{} documents in collection '{}'", count, args[0]);
        Ok(())
    }

    fn stats(&self) {
        let stats = self.db.stats();
        println!("Collections:      {}", stats.collections);
        println!("Documents:        {}", stats.documents);
        println!("Live records:     {}", stats.live_records);
        println!("Obsolete records: {}", stats.obsolete_records);
        println!("File size:        {} bytes", stats.file_bytes);
    }
}
