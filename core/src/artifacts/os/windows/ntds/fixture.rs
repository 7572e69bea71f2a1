//! Small directory used by unit tests. Mirrors `tests/test_data/ntds/ntds.json` apart from the
//! malformed values a snapshot cannot hold
use super::directory::{NtdsDirectory, OpenOptions};
use crate::{
    artifacts::os::windows::{
        ese::{cursor::EseDatabase, memory::MemoryDatabase},
        securitydescriptor::sid::{sid_string_to_bytes, sid_to_directory_sid},
    },
    utils::strings::encode_utf16_string,
};
use common::windows::ColumnType;

pub(crate) const EXAMPLE_DNT: u32 = 4;
pub(crate) const SCHEMA_DNT: u32 = 6;
pub(crate) const USERS_DNT: u32 = 100;
pub(crate) const ALICE_DNT: u32 = 101;
pub(crate) const BOB_DNT: u32 = 102;
pub(crate) const DOMAIN_USERS_DNT: u32 = 103;
pub(crate) const ADMINS_DNT: u32 = 104;
pub(crate) const SALES_DNT: u32 = 105;
pub(crate) const CAROL_DNT: u32 = 106;
pub(crate) const OLD_USER_DNT: u32 = 107;
pub(crate) const EMPTY_GROUP_DNT: u32 = 108;

const CONFIGURATION_DNT: u32 = 5;
const FIRST_CLASS_DNT: u32 = 7;

const TOP: u32 = 65536;
const PERSON: u32 = 65542;
const ORGANIZATIONAL_PERSON: u32 = 65543;
const USER: u32 = 655369;
const GROUP: u32 = 655368;
const SECURITY_PRINCIPAL: u32 = 655366;
const CONTAINER: u32 = 196631;
const DOMAIN_DNS: u32 = 655427;
const ORGANIZATIONAL_UNIT: u32 = 65541;
const CLASS_SCHEMA: u32 = 196621;
const ATTRIBUTE_SCHEMA: u32 = 196622;
const CONFIGURATION: u32 = 655372;
const DMD: u32 = 196617;

const CN: u32 = 3;
const OU: u32 = 11;
const DC: u32 = 1376281;

const DOMAIN_SID: &str = "S-1-5-21-1-2-3";

/// Owner S-1-5-32-544, group S-1-5-18
const ALICE_DESCRIPTOR: [u8; 48] = [
    1, 0, 0, 128, 20, 0, 0, 0, 36, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 0, 0, 0, 0, 0, 5, 32,
    0, 0, 0, 32, 2, 0, 0, 1, 1, 0, 0, 0, 0, 0, 5, 18, 0, 0, 0,
];
/// Owner and group S-1-5-18
const SHARED_DESCRIPTOR: [u8; 44] = [
    1, 0, 0, 128, 20, 0, 0, 0, 32, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 0, 0, 0, 0, 0, 5, 18,
    0, 0, 0, 1, 1, 0, 0, 0, 0, 0, 5, 18, 0, 0, 0,
];

const DATA_COLUMNS: [(&str, ColumnType); 37] = [
    ("DNT_col", ColumnType::Long),
    ("PDNT_col", ColumnType::Long),
    ("Ancestors_col", ColumnType::LongBinary),
    ("RDNtyp_col", ColumnType::Long),
    ("NCDNT_col", ColumnType::Long),
    ("ATTm589825", ColumnType::LongText),
    ("ATTi131120", ColumnType::Long),
    ("ATTj131073", ColumnType::Long),
    ("ATTc0", ColumnType::Long),
    ("ATTm131298", ColumnType::LongText),
    ("ATTm131532", ColumnType::LongText),
    ("ATTc131104", ColumnType::Long),
    ("ATTj131303", ColumnType::Long),
    ("ATTc131102", ColumnType::Long),
    ("ATTi131105", ColumnType::Long),
    ("ATTj131122", ColumnType::Long),
    ("ATTj131406", ColumnType::Long),
    ("ATTc131094", ColumnType::Long),
    ("ATTc131093", ColumnType::Long),
    ("ATTc131423", ColumnType::Long),
    ("ATTc590022", ColumnType::Long),
    ("ATTc131096", ColumnType::Long),
    ("ATTc590021", ColumnType::Long),
    ("ATTc131097", ColumnType::Long),
    ("ATTc590020", ColumnType::Long),
    ("ATTm3", ColumnType::LongText),
    ("ATTk589826", ColumnType::Binary),
    ("ATTr589970", ColumnType::LongBinary),
    ("ATTj589922", ColumnType::Long),
    ("ATTm590045", ColumnType::LongText),
    ("ATTm13", ColumnType::LongText),
    ("ATTl131090", ColumnType::LongLong),
    ("ATTp131353", ColumnType::LongBinary),
    ("ATTm11", ColumnType::LongText),
    ("ATTm1376281", ColumnType::LongText),
    ("ATTj590199", ColumnType::Long),
    ("ATTj590502", ColumnType::Long),
];

type Values = Vec<Option<Vec<u8>>>;
type Row = Vec<(&'static str, Values)>;

fn long(value: u32) -> Values {
    vec![Some((value as i32).to_le_bytes().to_vec())]
}

fn longs(values: &[u32]) -> Values {
    values
        .iter()
        .map(|value| Some((*value as i32).to_le_bytes().to_vec()))
        .collect()
}

fn text(value: &str) -> Values {
    vec![Some(encode_utf16_string(value))]
}

fn bytes(value: &[u8]) -> Values {
    vec![Some(value.to_vec())]
}

fn directory_sid(value: &str) -> Values {
    let sid = sid_string_to_bytes(value).and_then(|data| sid_to_directory_sid(&data));
    vec![sid]
}

/// Common columns of every record. `chain` is the full ancestry including the object
fn object(chain: &[u32], name: &str, rdn_type: u32, classes: &[u32]) -> Row {
    let dnt = chain[chain.len() - 1];
    let parent = if chain.len() > 1 { chain[chain.len() - 2] } else { 0 };
    let ancestry: Vec<u8> = chain.iter().flat_map(|value| value.to_le_bytes()).collect();
    vec![
        ("DNT_col", long(dnt)),
        ("PDNT_col", long(parent)),
        ("Ancestors_col", bytes(&ancestry)),
        ("RDNtyp_col", long(rdn_type)),
        ("ATTm589825", text(name)),
        ("ATTc0", longs(classes)),
    ]
}

fn schema_chain(dnt: u32) -> Vec<u32> {
    vec![2, 3, EXAMPLE_DNT, CONFIGURATION_DNT, SCHEMA_DNT, dnt]
}

struct ClassRow {
    name: &'static str,
    governs_id: u32,
    subclass_of: u32,
    system_must: &'static [u32],
    system_may: &'static [u32],
    may: &'static [u32],
    system_auxiliary: &'static [u32],
}

const fn class(name: &'static str, governs_id: u32, subclass_of: u32) -> ClassRow {
    ClassRow {
        name,
        governs_id,
        subclass_of,
        system_must: &[],
        system_may: &[],
        may: &[],
        system_auxiliary: &[],
    }
}

fn classes() -> Vec<ClassRow> {
    vec![
        ClassRow {
            system_must: &[0, 131073],
            system_may: &[
                589825, 131120, 589826, 131298, 13, 131090, 131353, 131174, 590199,
            ],
            ..class("top", TOP, TOP)
        },
        ClassRow {
            system_must: &[CN],
            ..class("person", PERSON, TOP)
        },
        class("organizationalPerson", ORGANIZATIONAL_PERSON, PERSON),
        ClassRow {
            system_auxiliary: &[SECURITY_PRINCIPAL],
            may: &[590045],
            system_may: &[589922],
            ..class("user", USER, ORGANIZATIONAL_PERSON)
        },
        ClassRow {
            system_may: &[31, 590045],
            system_auxiliary: &[SECURITY_PRINCIPAL],
            ..class("group", GROUP, TOP)
        },
        ClassRow {
            system_must: &[589970, 590045],
            ..class("securityPrincipal", SECURITY_PRINCIPAL, TOP)
        },
        ClassRow {
            system_may: &[CN],
            ..class("container", CONTAINER, TOP)
        },
        ClassRow {
            system_must: &[DC],
            ..class("domainDNS", DOMAIN_DNS, TOP)
        },
        ClassRow {
            system_must: &[OU],
            ..class("organizationalUnit", ORGANIZATIONAL_UNIT, TOP)
        },
        class("classSchema", CLASS_SCHEMA, TOP),
        class("attributeSchema", ATTRIBUTE_SCHEMA, TOP),
        class("configuration", CONFIGURATION, TOP),
        class("dMD", DMD, TOP),
    ]
}

/// name, attributeID, attributeSyntax, oMSyntax, single valued, linkID, searchFlags
type AttributeRow = (&'static str, u32, u32, u32, bool, u32, u32);

const ATTRIBUTES: [AttributeRow; 36] = [
    ("objectClass", 0, 0x80002, 6, false, 0, 0),
    ("cn", CN, 0x8000C, 64, true, 0, 0),
    ("name", 589825, 0x8000C, 64, true, 0, 5),
    ("instanceType", 131073, 0x80009, 2, true, 0, 0),
    ("isDeleted", 131120, 0x80008, 1, true, 0, 0),
    ("lDAPDisplayName", 131532, 0x8000C, 64, true, 0, 0),
    ("adminDescription", 131298, 0x8000C, 64, true, 0, 0),
    ("objectGUID", 589826, 0x8000A, 4, true, 0, 0),
    ("objectSid", 589970, 0x80011, 4, true, 0, 0),
    ("primaryGroupID", 589922, 0x80009, 2, true, 0, 0),
    ("sAMAccountName", 590045, 0x8000C, 64, true, 0, 5),
    ("member", 31, 0x80001, 127, false, 2, 0),
    ("memberOf", 131174, 0x80001, 127, false, 3, 0),
    ("description", 13, 0x8000C, 64, false, 0, 0),
    ("whenCreated", 131090, 0x8000B, 24, true, 0, 0),
    ("nTSecurityDescriptor", 131353, 0x8000F, 66, true, 0, 0),
    ("ou", OU, 0x8000C, 64, false, 0, 0),
    ("dc", DC, 0x8000C, 64, true, 0, 0),
    ("governsID", 131094, 0x80002, 6, true, 0, 0),
    ("attributeID", 131102, 0x80002, 6, true, 0, 0),
    ("attributeSyntax", 131104, 0x80002, 6, true, 0, 0),
    ("oMSyntax", 131303, 0x80009, 2, true, 0, 0),
    ("isSingleValued", 131105, 0x80008, 1, true, 0, 0),
    ("linkID", 131122, 0x80009, 2, true, 0, 0),
    ("searchFlags", 131406, 0x80009, 10, true, 0, 0),
    ("subClassOf", 131093, 0x80002, 6, true, 0, 0),
    ("auxiliaryClass", 131423, 0x80002, 6, false, 0, 0),
    ("systemAuxiliaryClass", 590022, 0x80002, 6, false, 0, 0),
    ("mustContain", 131096, 0x80002, 6, false, 0, 0),
    ("systemMustContain", 590021, 0x80002, 6, false, 0, 0),
    ("mayContain", 131097, 0x80002, 6, false, 0, 0),
    ("systemMayContain", 590020, 0x80002, 6, false, 0, 0),
    ("systemFlags", 590199, 0x80009, 2, true, 0, 0),
    ("dnStringValue", 590500, 0x8000E, 127, false, 0, 0),
    ("mysteryValue", 590501, 0x80019, 1, true, 0, 0),
    ("revisionNumbers", 590502, 0x80009, 2, false, 0, 0),
];

fn schema_rows() -> Vec<Row> {
    let mut rows = Vec::new();
    let mut dnt = FIRST_CLASS_DNT;
    for entry in classes() {
        let mut row = object(&schema_chain(dnt), entry.name, CN, &[CLASS_SCHEMA, TOP]);
        row.extend([
            ("ATTm3", text(entry.name)),
            ("ATTm131532", text(entry.name)),
            ("ATTc131094", long(entry.governs_id)),
            ("ATTc131093", long(entry.subclass_of)),
            ("ATTc590021", longs(entry.system_must)),
            ("ATTc590020", longs(entry.system_may)),
            ("ATTc131097", longs(entry.may)),
            ("ATTc590022", longs(entry.system_auxiliary)),
        ]);
        rows.push(row);
        dnt += 1;
    }

    for (name, id, syntax, om_syntax, single, link_id, search_flags) in ATTRIBUTES {
        let mut row = object(&schema_chain(dnt), name, CN, &[ATTRIBUTE_SCHEMA, TOP]);
        row.extend([
            ("ATTm3", text(name)),
            ("ATTm131532", text(name)),
            ("ATTc131102", long(id)),
            ("ATTc131104", long(syntax)),
            ("ATTj131303", long(om_syntax)),
            ("ATTi131105", long(single as u32)),
            ("ATTj131406", long(search_flags)),
        ]);
        if link_id != 0 {
            row.push(("ATTj131122", long(link_id)));
        }
        rows.push(row);
        dnt += 1;
    }
    rows
}

fn user(
    dnt: u32,
    parent: &[u32],
    name: &str,
    account: &str,
    rid: u32,
    primary_group: u32,
) -> Row {
    let mut chain = parent.to_vec();
    chain.push(dnt);
    let mut row = object(
        &chain,
        name,
        CN,
        &[USER, ORGANIZATIONAL_PERSON, PERSON, TOP],
    );
    row.extend([
        ("ATTm3", text(name)),
        ("ATTm590045", text(account)),
        ("ATTr589970", directory_sid(&format!("{DOMAIN_SID}-{rid}"))),
        ("ATTj589922", long(primary_group)),
    ]);
    row
}

fn group(dnt: u32, name: &str, rid: Option<u32>) -> Row {
    let mut row = object(&[2, 3, EXAMPLE_DNT, USERS_DNT, dnt], name, CN, &[GROUP, TOP]);
    row.extend([("ATTm3", text(name)), ("ATTm590045", text(name))]);
    if let Some(rid) = rid {
        row.push(("ATTr589970", directory_sid(&format!("{DOMAIN_SID}-{rid}"))));
    }
    row
}

fn domain_rows() -> Vec<Row> {
    let users = [2, 3, EXAMPLE_DNT, USERS_DNT];
    let sales = [2, 3, EXAMPLE_DNT, SALES_DNT];

    let mut root = object(&[2], "$ROOT_OBJECT$", 0, &[TOP]);
    root.push(("ATTj131073", long(0)));

    let mut com = object(&[2, 3], "com", DC, &[DOMAIN_DNS, TOP]);
    com.extend([("ATTm1376281", text("com")), ("ATTj131073", long(0))]);

    let mut example = object(&[2, 3, EXAMPLE_DNT], "example", DC, &[DOMAIN_DNS, TOP]);
    example.extend([
        ("ATTm1376281", text("example")),
        ("ATTj131073", long(5)),
        ("ATTr589970", directory_sid(DOMAIN_SID)),
        ("ATTp131353", bytes(&1i64.to_le_bytes())),
    ]);

    let mut configuration = object(
        &[2, 3, EXAMPLE_DNT, CONFIGURATION_DNT],
        "Configuration",
        CN,
        &[CONFIGURATION, TOP],
    );
    configuration.push(("ATTj131073", long(13)));

    let mut schema = object(
        &[2, 3, EXAMPLE_DNT, CONFIGURATION_DNT, SCHEMA_DNT],
        "Schema",
        CN,
        &[DMD, TOP],
    );
    schema.push(("ATTj131073", long(13)));

    let mut users_container = object(&users, "Users", CN, &[CONTAINER, TOP]);
    users_container.push(("ATTm3", text("Users")));

    let mut sales_unit = object(&sales, "Sales", OU, &[ORGANIZATIONAL_UNIT, TOP]);
    sales_unit.push(("ATTm11", text("Sales")));

    let mut alice = user(ALICE_DNT, &users, "Smith, Alice", "alice", 1104, 513);
    alice.extend([
        (
            "ATTm13",
            vec![
                Some(encode_utf16_string("first")),
                None,
                Some(encode_utf16_string("second")),
            ],
        ),
        ("ATTl131090", bytes(&13224476641i64.to_le_bytes())),
        (
            "ATTk589826",
            bytes(&[
                0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
                0xee, 0xff,
            ]),
        ),
        ("ATTp131353", bytes(&ALICE_DESCRIPTOR)),
        // Middle value is truncated
        (
            "ATTj590502",
            vec![
                Some(7i32.to_le_bytes().to_vec()),
                Some(vec![1, 2]),
                Some(9i32.to_le_bytes().to_vec()),
            ],
        ),
    ]);

    let mut old_user = user(OLD_USER_DNT, &users, "Old User", "olduser", 1107, 514);
    old_user.push(("ATTi131120", long(1)));

    vec![
        root,
        com,
        example,
        configuration,
        schema,
        users_container,
        alice,
        user(BOB_DNT, &users, "bob", "bob", 1105, 513),
        group(DOMAIN_USERS_DNT, "Domain Users", Some(513)),
        group(ADMINS_DNT, "Admins", Some(512)),
        sales_unit,
        user(CAROL_DNT, &sales, "carol", "carol", 1106, 513),
        old_user,
        group(EMPTY_GROUP_DNT, "Empty Group", None),
    ]
}

fn insert(db: &MemoryDatabase, table: &str, row: Row) {
    let values = row
        .into_iter()
        .map(|(column, data)| (db.column_id(table, column).unwrap(), data))
        .collect();
    db.insert_row(table, values).unwrap();
}

pub(crate) fn fixture_database() -> MemoryDatabase {
    let mut db = MemoryDatabase::new(true);
    db.create_table("datatable", &DATA_COLUMNS).unwrap();
    db.create_index("datatable", "DNT_index", &["DNT_col"]).unwrap();
    db.create_index("datatable", "PDNT_index", &["PDNT_col", "ATTm589825"])
        .unwrap();
    db.create_index("datatable", "Ancestors_index", &["Ancestors_col"])
        .unwrap();
    db.create_index("datatable", "INDEX_00090062", &["ATTj589922"])
        .unwrap();
    db.create_index("datatable", "INDEX_00090092", &["ATTr589970"])
        .unwrap();

    db.create_table(
        "link_table",
        &[
            ("link_DNT", ColumnType::Long),
            ("link_base", ColumnType::Long),
            ("backlink_DNT", ColumnType::Long),
        ],
    )
    .unwrap();
    db.create_index(
        "link_table",
        "link_index",
        &["link_DNT", "link_base", "backlink_DNT"],
    )
    .unwrap();
    db.create_index(
        "link_table",
        "backlink_index",
        &["backlink_DNT", "link_base", "link_DNT"],
    )
    .unwrap();

    db.create_table(
        "sd_table",
        &[
            ("sd_id", ColumnType::LongLong),
            ("sd_value", ColumnType::LongBinary),
        ],
    )
    .unwrap();
    db.create_index("sd_table", "sd_id_index", &["sd_id"]).unwrap();

    // Naming context heads, then the schema, then the domain objects
    let mut domain = domain_rows().into_iter();
    for row in domain.by_ref().take(5) {
        insert(&db, "datatable", row);
    }
    for row in schema_rows() {
        insert(&db, "datatable", row);
    }
    for row in domain {
        insert(&db, "datatable", row);
    }

    let links = [
        (ADMINS_DNT, ALICE_DNT),
        (ADMINS_DNT, BOB_DNT),
        (EMPTY_GROUP_DNT, BOB_DNT),
    ];
    for (group, member) in links {
        insert(
            &db,
            "link_table",
            vec![
                ("link_DNT", long(group)),
                ("link_base", long(1)),
                ("backlink_DNT", long(member)),
            ],
        );
    }
    insert(
        &db,
        "sd_table",
        vec![
            ("sd_id", bytes(&1i64.to_le_bytes())),
            ("sd_value", bytes(&SHARED_DESCRIPTOR)),
        ],
    );
    db
}

pub(crate) fn fixture_directory() -> NtdsDirectory {
    NtdsDirectory::from_database(Box::new(fixture_database()), &OpenOptions::default()).unwrap()
}
