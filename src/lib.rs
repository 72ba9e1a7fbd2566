pub mod core;
pub mod analysis;
pub mod schema;
pub mod index;
pub mod scoring;
pub mod search;
pub mod mvcc;
pub mod rules;
pub mod model;

pub use crate::core::config::Config;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::types::{Document, FieldValue, Record};
pub use crate::index::index::Index;
pub use crate::index::transactional::TransactionalIndex;
pub use crate::model::catalogue::TypeCatalogue;
pub use crate::model::factory::CatalogueModelFactory;
pub use crate::mvcc::controller::IsolationLevel;
pub use crate::schema::mapping::IndexMapping;

/*
┌──────────────────────────────────────────────────────────────────────────────────────┐
│                              CATALOGIX STRUCT ARCHITECTURE                           │
└──────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── MODEL LAYER ─────────────────────────────────────┐
│                                                                                      │
│  RawModel (DeclarationSource)                                                        │
│        │  kinds() / declarations(kind)                                               │
│        ▼                                                                             │
│  ┌──────────────────────────┐      ┌──────────────────────────────────────────────┐  │
│  │ struct FactBase          │      │ struct RuleBase                              │  │
│  │ • facts: Vec<Fact>       │◄─────│ • name: "default" | "permissive" | json      │  │
│  │ • outcomes: normal form  │      │ • rules: FactKind → Vec<Rule>                │  │
│  │   or failure reason      │      └──────────────────────────────────────────────┘  │
│  └──────────────────────────┘                                                        │
│        │  query_normal_form / links / supports_external_id                           │
│        ▼                                                                             │
│  ┌──────────────────────────────────────────────────────────────────────────────┐    │
│  │ struct CatalogueModelFactory                                                 │    │
│  │ 1 restricted → 2 enumerations → 3 hierarchies (leaf_paths DFS)               │    │
│  │ → 4 components (TypeRef::Pending for unseen names) → 5 resolve_pending       │    │
│  │ → 6 infer_relationships (ownership decision table)                           │    │
│  └──────────────────────────────────────────────────────────────────────────────┘    │
│        ▼                                                                             │
│  ┌──────────────────────────────────────────────────────────────────────────────┐    │
│  │ struct TypeCatalogue                                                         │    │
│  │ • types: Vec<Type>            // arena, TypeId = index                       │    │
│  │ • by_name: HashMap<String, TypeId>                                           │    │
│  │ • diagnostics: Vec<Diagnostic>                                               │    │
│  └──────────────────────────────────────────────────────────────────────────────┘    │
└──────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── INDEX LAYER ─────────────────────────────────────┐
│                                                                                      │
│  Record ──► MappingRegistry::extract ──► Analyzer ──► TermSet                        │
│              (type + supertypes)        tokenizer → lowercase → stop words           │
│                                         → synonyms → stemmer                         │
│                                                                                      │
│  ┌───────────────────────────────┐    ┌─────────────────────────────────────────┐    │
│  │ struct Index<K, E>            │    │ struct TransactionalIndex<K, E>         │    │
│  │ • pipeline: IndexPipeline     │    │ • pipeline: IndexPipeline               │    │
│  │ • slots: K → u32              │    │ • store: MVCCController (version chains)│    │
│  │ • entries: u32 → StoredEntry  │    │ • pending: K → (TxId, PendingWrite)     │    │
│  │ • inverted: term → Roaring    │    │ • locks: LockManager (per key, timeout) │    │
│  └───────────────────────────────┘    │ • transactions: ThreadId → Transaction  │    │
│                                       └─────────────────────────────────────────┘    │
│                                                                                      │
│  search: query_groups → candidates (bitmap union) → Scorer → SearchResults           │
│          ordered by (matched groups, rating, insertion)                              │
└──────────────────────────────────────────────────────────────────────────────────────┘
*/
