use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    seq: u64,
}

impl Sidecar {
    fn spawn() -> Self {
        let exe = env!("CARGO_BIN_EXE_attendd");
        let mut child = Command::new(exe)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn attendd");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Sidecar {
            child,
            stdin,
            reader: BufReader::new(stdout),
            seq: 0,
        }
    }

    fn call(
        &mut self,
        method: &str,
        actor: Option<&(String, &str)>,
        params: serde_json::Value,
    ) -> serde_json::Value {
        self.seq += 1;
        let id = self.seq.to_string();
        let mut payload = json!({ "id": id, "method": method, "params": params });
        if let Some((actor_id, role)) = actor {
            payload["actor"] = json!({ "id": actor_id, "role": role });
        }
        writeln!(self.stdin, "{}", payload).expect("write request");
        self.stdin.flush().expect("flush request");

        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read response line");
        let value: serde_json::Value =
            serde_json::from_str(line.trim()).expect("parse response json");
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    fn ok(
        &mut self,
        method: &str,
        actor: Option<&(String, &str)>,
        params: serde_json::Value,
    ) -> serde_json::Value {
        let resp = self.call(method, actor, params);
        assert_eq!(resp["ok"], json!(true), "{} failed: {}", method, resp);
        resp["result"].clone()
    }

    fn err_code(
        &mut self,
        method: &str,
        actor: Option<&(String, &str)>,
        params: serde_json::Value,
    ) -> String {
        let resp = self.call(method, actor, params);
        assert_eq!(resp["ok"], json!(false), "{} unexpectedly ok: {}", method, resp);
        resp["error"]["code"].as_str().expect("error code").to_string()
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn register(
    sc: &mut Sidecar,
    name: &str,
    email: &str,
    role: &'static str,
) -> (String, &'static str) {
    let res = sc.ok(
        "users.register",
        None,
        json!({ "name": name, "email": email, "password": "pw", "role": role }),
    );
    (res["user"]["id"].as_str().expect("user id").to_string(), role)
}

fn open_workspace(sc: &mut Sidecar, prefix: &str) {
    let workspace = temp_dir(prefix);
    sc.ok(
        "workspace.select",
        None,
        json!({ "path": workspace.to_string_lossy() }),
    );
}

#[test]
fn protocol_errors_keep_stable_codes() {
    let mut sc = Sidecar::spawn();
    assert_eq!(sc.err_code("students.list", None, json!({})), "no_workspace");
    assert_eq!(sc.err_code("nope.nothing", None, json!({})), "not_implemented");

    writeln!(sc.stdin, "{{not json").expect("write garbage");
    sc.stdin.flush().expect("flush");
    let mut line = String::new();
    sc.reader.read_line(&mut line).expect("read");
    let v: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(v["error"]["code"], json!("bad_json"));

    let health = sc.ok("health", None, json!({}));
    assert_eq!(health["version"], json!(env!("CARGO_PKG_VERSION")));
}

#[test]
fn invalid_log_filter_stops_startup() {
    let out = Command::new(env!("CARGO_BIN_EXE_attendd"))
        .args(["--log", "attendd=verbose"])
        .stdin(Stdio::null())
        .output()
        .expect("run attendd");
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("invalid log filter"), "{}", stderr);
}

#[test]
fn registration_login_and_user_directory() {
    let mut sc = Sidecar::spawn();
    open_workspace(&mut sc, "attendd-directory-users");
    let admin = register(&mut sc, "Admin", "admin@school.test", "admin");
    let teacher = register(&mut sc, "Tess", "tess@school.test", "teacher");

    let code = sc.err_code(
        "users.register",
        None,
        json!({
            "name": "Tess 2",
            "email": "tess@school.test",
            "password": "pw",
            "role": "teacher"
        }),
    );
    assert_eq!(code, "conflict");

    // A second admin needs an admin actor.
    let code = sc.err_code(
        "users.register",
        None,
        json!({
            "name": "Mallory",
            "email": "m@school.test",
            "password": "pw",
            "role": "admin"
        }),
    );
    assert_eq!(code, "forbidden");
    // A role that is present but not a known role string never defaults.
    for role in [json!("janitor"), json!(1), json!(null), json!(false)] {
        let code = sc.err_code(
            "users.register",
            None,
            json!({
                "name": "Mallory",
                "email": "m@school.test",
                "password": "pw",
                "role": role
            }),
        );
        assert_eq!(code, "validation_error", "role {}", role);
    }

    let login = sc.ok(
        "auth.login",
        None,
        json!({ "email": "tess@school.test", "password": "pw" }),
    );
    assert_eq!(login["userId"], json!(teacher.0));
    assert_eq!(login["role"], json!("teacher"));
    let code = sc.err_code(
        "auth.login",
        None,
        json!({ "email": "tess@school.test", "password": "wrong" }),
    );
    assert_eq!(code, "unauthenticated");

    let users = sc.ok("users.list", Some(&admin), json!({}));
    let users = users["users"].as_array().expect("users");
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.get("passwordHash").is_none()));
    assert_eq!(sc.err_code("users.list", Some(&teacher), json!({})), "forbidden");

    let teachers = sc.ok("teachers.list", None, json!({}));
    assert_eq!(teachers["teachers"], json!([{ "id": teacher.0, "name": "Tess" }]));

    // No role at all registers a teacher.
    let defaulted = sc.ok(
        "users.register",
        None,
        json!({ "name": "Nell", "email": "nell@school.test", "password": "pw" }),
    );
    assert_eq!(defaulted["user"]["role"], json!("teacher"));
}

#[test]
fn student_roster_is_admin_managed() {
    let mut sc = Sidecar::spawn();
    open_workspace(&mut sc, "attendd-directory-students");
    let admin = register(&mut sc, "Admin", "admin@school.test", "admin");
    let teacher = register(&mut sc, "Tess", "tess@school.test", "teacher");

    let code = sc.err_code(
        "students.create",
        Some(&teacher),
        json!({ "name": "Ada", "rollNumber": "R1", "class": 5 }),
    );
    assert_eq!(code, "forbidden");

    let created = sc.ok(
        "students.create",
        Some(&admin),
        json!({ "name": "Ada", "rollNumber": "R1", "class": "5" }),
    );
    let ada = created["studentId"].as_str().expect("studentId").to_string();
    assert_eq!(created["student"]["class"], json!(5));

    let code = sc.err_code(
        "students.create",
        Some(&admin),
        json!({ "name": "Other", "rollNumber": "R1", "class": 5 }),
    );
    assert_eq!(code, "conflict");
    let code = sc.err_code(
        "students.create",
        Some(&admin),
        json!({ "name": " ", "rollNumber": "R9", "class": 5 }),
    );
    assert_eq!(code, "validation_error");

    let updated = sc.ok(
        "students.update",
        Some(&admin),
        json!({ "studentId": ada, "name": "Ada L", "rollNumber": "R1", "class": 6 }),
    );
    assert_eq!(updated["student"]["name"], json!("Ada L"));
    let code = sc.err_code(
        "students.update",
        Some(&admin),
        json!({ "studentId": "missing", "name": "X", "rollNumber": "R5", "class": 6 }),
    );
    assert_eq!(code, "not_found");

    let list = sc.ok("students.list", Some(&admin), json!({}));
    assert_eq!(list["students"][0]["class"], json!(6));
    assert_eq!(sc.err_code("students.list", Some(&teacher), json!({})), "forbidden");
}

#[test]
fn assignments_dedupe_and_deletes_cascade() {
    let mut sc = Sidecar::spawn();
    open_workspace(&mut sc, "attendd-directory-cascade");
    let admin = register(&mut sc, "Admin", "admin@school.test", "admin");
    let tess = register(&mut sc, "Tess", "tess@school.test", "teacher");
    let tom = register(&mut sc, "Tom", "tom@school.test", "teacher");
    let ada = sc.ok(
        "students.create",
        Some(&admin),
        json!({ "name": "Ada", "rollNumber": "R1", "class": 5 }),
    )["studentId"]
        .as_str()
        .expect("studentId")
        .to_string();
    let ben = sc.ok(
        "students.create",
        Some(&admin),
        json!({ "name": "Ben", "rollNumber": "R2", "class": 5 }),
    )["studentId"]
        .as_str()
        .expect("studentId")
        .to_string();

    let pair = json!({ "teacherId": tess.0, "studentId": ada });
    sc.ok("assignments.assign", Some(&admin), pair.clone());
    assert_eq!(sc.err_code("assignments.assign", Some(&admin), pair.clone()), "conflict");
    assert_eq!(sc.err_code("assignments.assign", Some(&tess), pair.clone()), "forbidden");
    assert_eq!(
        sc.err_code(
            "assignments.assign",
            Some(&admin),
            json!({ "teacherId": "ghost", "studentId": ada }),
        ),
        "not_found"
    );
    assert_eq!(
        sc.err_code(
            "assignments.unassign",
            Some(&admin),
            json!({ "teacherId": tom.0, "studentId": ada }),
        ),
        "not_found"
    );
    sc.ok(
        "assignments.assign",
        Some(&admin),
        json!({ "teacherId": tess.0, "studentId": ben }),
    );
    sc.ok(
        "assignments.assign",
        Some(&admin),
        json!({ "teacherId": tom.0, "studentId": ben }),
    );

    let mine = sc.ok("assignments.myStudents", Some(&tess), json!({}));
    let rolls: Vec<&str> = mine["students"]
        .as_array()
        .expect("students")
        .iter()
        .map(|s| s["rollNumber"].as_str().expect("roll"))
        .collect();
    assert_eq!(rolls, vec!["R1", "R2"]);
    assert_eq!(
        sc.err_code("assignments.myStudents", Some(&admin), json!({})),
        "forbidden"
    );

    sc.ok(
        "attendance.mark",
        Some(&tess),
        json!({ "studentId": ada, "date": "2024-05-01", "status": "present" }),
    );
    sc.ok(
        "attendance.mark",
        Some(&tom),
        json!({ "studentId": ben, "date": "2024-05-01", "status": "absent" }),
    );

    // Deleting a student drops its assignments and attendance.
    sc.ok("students.delete", Some(&admin), json!({ "studentId": ada }));
    let mine = sc.ok("assignments.myStudents", Some(&tess), json!({}));
    assert_eq!(mine["students"].as_array().expect("students").len(), 1);
    let records = sc.ok("attendance.list", Some(&admin), json!({}));
    assert_eq!(records["records"].as_array().expect("records").len(), 1);

    // Deleting a teacher drops what they marked.
    assert_eq!(
        sc.err_code("teachers.delete", Some(&admin), json!({ "userId": admin.0 })),
        "forbidden"
    );
    sc.ok("teachers.delete", Some(&admin), json!({ "userId": tom.0 }));
    let records = sc.ok("attendance.list", Some(&admin), json!({}));
    assert!(records["records"].as_array().expect("records").is_empty());
    assert_eq!(sc.err_code("attendance.list", Some(&tom), json!({})), "unauthenticated");
    assert_eq!(
        sc.err_code("students.delete", Some(&admin), json!({ "studentId": ada })),
        "not_found"
    );
}

#[test]
fn teacher_accounts_are_editable_by_admin() {
    let mut sc = Sidecar::spawn();
    open_workspace(&mut sc, "attendd-directory-teachers");
    let admin = register(&mut sc, "Admin", "admin@school.test", "admin");
    let tess = register(&mut sc, "Tess", "tess@school.test", "teacher");
    let _tom = register(&mut sc, "Tom", "tom@school.test", "teacher");

    let updated = sc.ok(
        "teachers.update",
        Some(&admin),
        json!({ "userId": tess.0, "name": "Tess Q", "email": "tq@school.test" }),
    );
    assert_eq!(updated["teacher"]["email"], json!("tq@school.test"));
    assert_eq!(
        sc.err_code(
            "teachers.update",
            Some(&admin),
            json!({ "userId": tess.0, "name": "Tess Q", "email": "tom@school.test" }),
        ),
        "conflict"
    );
    assert_eq!(
        sc.err_code(
            "teachers.update",
            Some(&tess),
            json!({ "userId": tess.0, "name": "Me", "email": "me@school.test" }),
        ),
        "forbidden"
    );
    assert_eq!(
        sc.err_code(
            "teachers.update",
            Some(&admin),
            json!({ "userId": "ghost", "name": "G", "email": "g@school.test" }),
        ),
        "not_found"
    );

    sc.ok(
        "auth.login",
        None,
        json!({ "email": "tq@school.test", "password": "pw" }),
    );
}
